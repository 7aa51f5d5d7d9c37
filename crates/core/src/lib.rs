//! Domain types and pure logic for the reelfetch job service.
//!
//! Nothing in this crate owns a runtime task or a lock. The orchestration
//! layer (`reelfetch-pipeline`) and the HTTP layer (`reelfetch-api`) build on
//! these pieces:
//!
//! - [`platform`]: URL classification into a supported [`platform::Platform`].
//! - [`command`]: argument list for the external extraction tool.
//! - [`progress`]: classification of the tool's output lines.
//! - [`resolver`]: locating the produced artifact from weak signals.
//! - [`schedule`] / [`workdir`]: daily purge timing and the purge itself.

pub mod command;
pub mod error;
pub mod job;
pub mod media;
pub mod platform;
pub mod progress;
pub mod resolver;
pub mod schedule;
pub mod types;
pub mod workdir;
