use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use reelfetch_pipeline::{JobOrchestrator, OrchestratorConfig, TtlEviction};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Owns every job: creation, execution, events, and results.
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    /// Build the orchestrator (and start its workers) from `config`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let mut pipeline = OrchestratorConfig::new(config.download_dir.clone());
        pipeline.tool = config.tool.clone();
        pipeline.max_concurrent_jobs = config.max_concurrent_jobs;
        pipeline.max_queued_jobs = config.max_queued_jobs;

        let ttl = TimeDelta::from_std(Duration::from_secs(config.job_ttl_secs))
            .unwrap_or(TimeDelta::MAX);
        let orchestrator = JobOrchestrator::new(pipeline, Box::new(TtlEviction::new(ttl)));

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}
