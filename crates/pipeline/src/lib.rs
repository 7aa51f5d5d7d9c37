//! Job execution pipeline.
//!
//! Jobs are created in the [`registry`], queued on the [`pool`], and run as
//! child processes by the [`runner`]. [`orchestrator::JobOrchestrator`] ties
//! these together and is what the HTTP layer talks to.

pub mod eviction;
pub mod job;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod runner;

pub use eviction::{EvictionPolicy, TtlEviction};
pub use orchestrator::{JobOrchestrator, OrchestratorConfig};
