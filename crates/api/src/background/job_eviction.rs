//! Periodic removal of finished jobs from the registry.

use std::sync::Arc;
use std::time::Duration;

use reelfetch_pipeline::JobOrchestrator;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run the eviction sweeper until `cancel` is triggered.
pub async fn run(orchestrator: Arc<JobOrchestrator>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Job eviction sweeper started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job eviction sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let removed = orchestrator.evict_expired();
                if removed > 0 {
                    tracing::info!(removed, remaining = orchestrator.job_count(), "Evicted finished jobs");
                }
            }
        }
    }
}
