//! Per-job event delivery.
//!
//! Each job owns one ordered, append-only channel of
//! [`ProgressEvent`](reelfetch_core::job::ProgressEvent)s:
//!
//! - [`EventSender`]: the writing half, held only by the job's runner.
//! - [`JobEventChannel`]: the reading half, shared with HTTP consumers.
//!   Events are handed out once; there is no replay.

pub mod channel;

pub use channel::{job_channel, EventSender, EventSubscription, JobEventChannel};
