//! Entry point for everything job-related: starting extractions, streaming
//! their events, and handing out their results.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use reelfetch_core::command::{ExternalCommand, ExternalCommandSpec, ToolCommand};
use reelfetch_core::error::CoreError;
use reelfetch_core::job::{JobState, ProgressEvent};
use reelfetch_core::resolver::DEFAULT_SETTLE_DELAY;
use reelfetch_core::types::JobId;

use crate::eviction::EvictionPolicy;
use crate::job::JobSnapshot;
use crate::pool::{JobTask, WorkerPool};
use crate::registry::JobRegistry;
use crate::runner::ProcessRunner;

pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
pub const DEFAULT_MAX_QUEUED_JOBS: usize = 64;

pub const MSG_STILL_PROCESSING: &str = "Still processing. Please wait.";
pub const MSG_FILE_GONE: &str = "The file is no longer available.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Shared working directory for every job.
    pub download_dir: PathBuf,
    pub tool: ToolCommand,
    pub max_concurrent_jobs: usize,
    pub max_queued_jobs: usize,
    pub settle_delay: Duration,
}

impl OrchestratorConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            tool: ToolCommand::default(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_queued_jobs: DEFAULT_MAX_QUEUED_JOBS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

pub struct JobOrchestrator {
    config: OrchestratorConfig,
    registry: JobRegistry,
    pool: WorkerPool,
    eviction: Box<dyn EvictionPolicy>,
}

impl JobOrchestrator {
    /// Build the orchestrator and start its workers. Requires a Tokio runtime.
    pub fn new(config: OrchestratorConfig, eviction: Box<dyn EvictionPolicy>) -> Self {
        let runner = ProcessRunner::new().with_settle_delay(config.settle_delay);
        let pool = WorkerPool::start(config.max_concurrent_jobs, config.max_queued_jobs, runner);
        tracing::info!(
            workers = pool.size(),
            queue = config.max_queued_jobs,
            download_dir = %config.download_dir.display(),
            "Job orchestrator started",
        );
        Self {
            config,
            registry: JobRegistry::new(),
            pool,
            eviction,
        }
    }

    /// Register a job for `spec` and queue it. Returns immediately.
    pub fn start(&self, spec: &ExternalCommandSpec) -> Result<JobId, CoreError> {
        let command = ExternalCommand::from_spec(&self.config.tool, spec, &self.config.download_dir);
        self.start_command(command)
    }

    /// Queue an already built command.
    pub fn start_command(&self, command: ExternalCommand) -> Result<JobId, CoreError> {
        let (_, writer) = self.registry.create();
        let job_id = writer.id().clone();
        tracing::info!(%job_id, "Job accepted");
        self.pool.submit(JobTask { writer, command })?;
        Ok(job_id)
    }

    /// The job's undelivered events, ending after the terminal one.
    pub fn subscribe(
        &self,
        id: &JobId,
    ) -> Result<impl Stream<Item = ProgressEvent> + Send + 'static, CoreError> {
        Ok(self.registry.get(id)?.events().stream())
    }

    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot, CoreError> {
        Ok(self.registry.get(id)?.snapshot())
    }

    /// Path of a finished job's artifact.
    ///
    /// Checked in order: unknown id, stored failure, still running, file
    /// removed since.
    pub async fn result(&self, id: &JobId) -> Result<PathBuf, CoreError> {
        let snapshot = self.snapshot(id)?;
        if let Some(message) = snapshot.error_message {
            return Err(CoreError::JobFailed(message));
        }
        match (snapshot.state, snapshot.result_file) {
            (JobState::Done, Some(path)) => {
                let present = tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|m| m.is_file());
                if present {
                    Ok(path)
                } else {
                    Err(CoreError::Gone(MSG_FILE_GONE.to_string()))
                }
            }
            (JobState::Done, None) => Err(CoreError::Gone(MSG_FILE_GONE.to_string())),
            _ => Err(CoreError::Conflict(MSG_STILL_PROCESSING.to_string())),
        }
    }

    /// Drop finished jobs selected by the eviction policy.
    pub fn evict_expired(&self) -> usize {
        let removed = self.registry.evict(self.eviction.as_ref(), Utc::now());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.registry.len(), "Evicted finished jobs");
        }
        removed
    }

    pub fn job_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the workers, failing whatever is still running or queued.
    pub fn shutdown(&self) {
        tracing::info!(jobs = self.registry.len(), "Stopping job workers");
        self.pool.shutdown();
    }
}
