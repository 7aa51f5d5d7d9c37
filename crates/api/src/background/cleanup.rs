//! Daily purge of the shared download directory.
//!
//! Sleeps until the configured wall-clock time in the configured timezone,
//! deletes everything in the directory that is older than the minimum age,
//! and repeats. Failures never end the loop; it waits [`RETRY_DELAY`] and
//! tries again.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use chrono_tz::Tz;
use reelfetch_core::schedule::{delay_until_next, DailyTime};
use reelfetch_core::workdir::{purge_dir, PurgeReport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Pause after a failed sweep or schedule computation.
pub const RETRY_DELAY: Duration = Duration::from_secs(60);

static STARTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct CleanupSettings {
    pub dir: PathBuf,
    pub at: DailyTime,
    pub timezone: Tz,
    pub min_age: Duration,
    pub enabled: bool,
}

impl CleanupSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            dir: config.download_dir.clone(),
            at: config.cleanup_time,
            timezone: config.timezone,
            min_age: Duration::from_secs(config.cleanup_min_age_secs),
            enabled: config.cleanup_enabled,
        }
    }
}

/// Spawn the cleanup loop, at most once per process.
///
/// Returns `None` when cleanup is disabled or a loop is already running.
pub fn spawn(settings: CleanupSettings, cancel: CancellationToken) -> Option<JoinHandle<()>> {
    if !settings.enabled {
        tracing::info!("Daily cleanup disabled");
        return None;
    }
    if STARTED.swap(true, Ordering::SeqCst) {
        tracing::debug!("Daily cleanup already running");
        return None;
    }
    Some(tokio::spawn(run(settings, cancel)))
}

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(settings: CleanupSettings, cancel: CancellationToken) {
    tracing::info!(
        dir = %settings.dir.display(),
        at = %settings.at,
        tz = %settings.timezone,
        min_age_secs = settings.min_age.as_secs(),
        "Daily cleanup scheduled",
    );

    loop {
        let now = Utc::now().with_timezone(&settings.timezone);
        let outcome = match delay_until_next(&now, settings.at) {
            Ok(wait) => {
                tracing::debug!(wait_secs = wait.as_secs(), "Waiting for next cleanup");
                if sleep_or_cancel(wait, &cancel).await {
                    break;
                }
                sweep(&settings).await.map(|_| ()).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        if let Err(error) = outcome {
            tracing::error!(%error, retry_secs = RETRY_DELAY.as_secs(), "Cleanup failed");
            if sleep_or_cancel(RETRY_DELAY, &cancel).await {
                break;
            }
        }
    }

    tracing::info!("Daily cleanup stopping");
}

/// Purge the directory once and log what happened.
///
/// Only an unreadable directory is an error; per-entry failures are logged.
pub async fn sweep(settings: &CleanupSettings) -> io::Result<PurgeReport> {
    let report = purge_dir(&settings.dir, settings.min_age, SystemTime::now()).await?;
    for (path, error) in &report.failures {
        tracing::warn!(path = %path.display(), %error, "Could not remove entry");
    }
    tracing::info!(
        removed = report.removed,
        skipped = report.skipped,
        failed = report.failures.len(),
        "Cleanup sweep finished",
    );
    Ok(report)
}

/// Sleep for `duration`; `true` if cancelled first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
