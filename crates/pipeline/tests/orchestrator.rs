//! End-to-end job lifecycle tests against a scripted stand-in for the
//! extraction tool (`sh -c <script>`; the generated arguments become unused
//! positional parameters).

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::TimeDelta;
use futures::StreamExt;
use reelfetch_core::command::{ExternalCommandSpec, ToolCommand};
use reelfetch_core::error::CoreError;
use reelfetch_core::job::{JobState, ProgressEvent};
use reelfetch_core::platform::Platform;
use reelfetch_core::types::JobId;
use reelfetch_pipeline::{JobOrchestrator, OrchestratorConfig, TtlEviction};

const SUCCESS_SCRIPT: &str = r#"
echo "[download]   0.0% of 1.00KiB at 1.00KiB/s ETA 00:01"
echo "WARNING: falling back to generic extractor" >&2
echo "[download]  50.0% of 1.00KiB at 1.00KiB/s ETA 00:01"
printf 'data' > uploader-title-abc123.mp4
echo "[download] 100% of 1.00KiB"
echo "[reelfetch:id] abc123"
echo "[reelfetch:path] $PWD/uploader-title-abc123.mp4"
"#;

fn orchestrator(dir: &Path, script: &str, ttl: TimeDelta) -> JobOrchestrator {
    let mut config = OrchestratorConfig::new(dir);
    config.tool = ToolCommand::new("sh").with_leading_args(["-c", script, "fake-yt-dlp"]);
    config.settle_delay = Duration::from_millis(10);
    JobOrchestrator::new(config, Box::new(TtlEviction::new(ttl)))
}

fn spec() -> ExternalCommandSpec {
    ExternalCommandSpec::new(Platform::Youtube, "https://youtu.be/abc123")
}

async fn drain(orch: &JobOrchestrator, id: &JobId) -> Vec<ProgressEvent> {
    let stream = orch.subscribe(id).unwrap();
    tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("job did not finish in time")
}

#[tokio::test]
async fn successful_job_streams_progress_then_done() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), SUCCESS_SCRIPT, TimeDelta::hours(1));

    let id = orch.start(&spec()).unwrap();
    let events = drain(&orch, &id).await;

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![0.0, 50.0, 100.0]);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Done {
            filename: "uploader-title-abc123.mp4".into()
        })
    );

    let path = orch.result(&id).await.unwrap();
    assert_eq!(path, dir.path().join("uploader-title-abc123.mp4"));
    assert_eq!(orch.snapshot(&id).unwrap().state, JobState::Done);
}

#[tokio::test]
async fn failed_job_reports_stored_message() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        dir.path(),
        "echo 'ERROR: Unsupported URL' >&2; exit 1",
        TimeDelta::hours(1),
    );

    let id = orch.start(&spec()).unwrap();
    let events = drain(&orch, &id).await;
    assert_eq!(events.len(), 1);
    assert_matches!(&events[0], ProgressEvent::Error { message } if message.contains("exit code 1"));

    assert_matches!(orch.result(&id).await, Err(CoreError::JobFailed(m)) if m.contains("exit code 1"));
}

#[tokio::test]
async fn result_before_completion_is_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        dir.path(),
        "sleep 1; printf 'x' > late.mp4",
        TimeDelta::hours(1),
    );

    let id = orch.start(&spec()).unwrap();
    assert_matches!(orch.result(&id).await, Err(CoreError::Conflict(_)));

    drain(&orch, &id).await;
    let path = orch.result(&id).await.unwrap();
    assert_eq!(path.file_name().unwrap(), "late.mp4");
}

#[tokio::test]
async fn removed_artifact_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), SUCCESS_SCRIPT, TimeDelta::hours(1));

    let id = orch.start(&spec()).unwrap();
    drain(&orch, &id).await;

    std::fs::remove_file(orch.result(&id).await.unwrap()).unwrap();
    assert_matches!(orch.result(&id).await, Err(CoreError::Gone(_)));
}

#[tokio::test]
async fn second_subscriber_gets_nothing_after_drain() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), SUCCESS_SCRIPT, TimeDelta::hours(1));

    let id = orch.start(&spec()).unwrap();
    let first = drain(&orch, &id).await;
    assert!(!first.is_empty());

    let second = drain(&orch, &id).await;
    assert!(second.is_empty());
}

#[tokio::test]
async fn finished_jobs_are_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), SUCCESS_SCRIPT, TimeDelta::zero());

    let id = orch.start(&spec()).unwrap();
    drain(&orch, &id).await;
    assert_eq!(orch.job_count(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(orch.evict_expired(), 1);
    assert_eq!(orch.job_count(), 0);
    assert_matches!(orch.result(&id).await, Err(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn running_jobs_survive_eviction() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), "sleep 2", TimeDelta::zero());

    let id = orch.start(&spec()).unwrap();
    assert_eq!(orch.evict_expired(), 0);
    assert!(orch.snapshot(&id).is_ok());
    orch.shutdown();
}

#[tokio::test]
async fn full_queue_returns_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = OrchestratorConfig::new(dir.path());
    config.tool = ToolCommand::new("sh").with_leading_args(["-c", "sleep 5", "fake-yt-dlp"]);
    config.max_concurrent_jobs = 1;
    config.max_queued_jobs = 1;
    let orch = JobOrchestrator::new(config, Box::new(TtlEviction::new(TimeDelta::hours(1))));

    let outcomes: Vec<_> = (0..3).map(|_| orch.start(&spec())).collect();
    let rejected: Vec<_> = outcomes.iter().filter(|o| o.is_err()).collect();
    assert!(!rejected.is_empty());
    for outcome in rejected {
        assert_matches!(outcome, Err(CoreError::Unavailable(_)));
    }
    orch.shutdown();
}
