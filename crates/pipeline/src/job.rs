//! In-memory job record and its single writer.
//!
//! A [`JobHandle`] is shared (registry, HTTP handlers); a [`JobWriter`] is
//! not. Only the writer mutates the job's state and outcome, and its terminal
//! methods consume it, so a job reaches a terminal state and emits its
//! terminal event exactly once. A writer dropped without an outcome (runner
//! panic, pool shutdown) fails the job instead of leaving it pending.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use reelfetch_core::job::{JobState, ProgressEvent, MSG_ABORTED};
use reelfetch_core::progress::ProgressUpdate;
use reelfetch_core::types::{JobId, Timestamp};
use reelfetch_events::{job_channel, EventSender, JobEventChannel};

/// Mutable part of a job, written only through [`JobWriter`].
#[derive(Debug, Clone)]
struct JobStatus {
    state: JobState,
    result_file: Option<PathBuf>,
    error_message: Option<String>,
    finished_at: Option<Timestamp>,
}

/// Point-in-time copy of a job, for reads outside the job's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub result_file: Option<PathBuf>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Shared, read-mostly view of one job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    created_at: Timestamp,
    status: Mutex<JobStatus>,
    events: JobEventChannel,
}

impl JobHandle {
    /// Create a pending job and the writer that owns its mutations.
    pub fn create(id: JobId) -> (Arc<JobHandle>, JobWriter) {
        let (sender, events) = job_channel();
        let handle = Arc::new(JobHandle {
            id,
            created_at: Utc::now(),
            status: Mutex::new(JobStatus {
                state: JobState::Pending,
                result_file: None,
                error_message: None,
                finished_at: None,
            }),
            events,
        });
        let writer = JobWriter {
            job: Arc::clone(&handle),
            events: sender,
            finished: false,
        };
        (handle, writer)
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn events(&self) -> &JobEventChannel {
        &self.events
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.status();
        JobSnapshot {
            id: self.id.clone(),
            state: status.state,
            result_file: status.result_file.clone(),
            error_message: status.error_message.clone(),
            created_at: self.created_at,
            finished_at: status.finished_at,
        }
    }

    fn status(&self) -> MutexGuard<'_, JobStatus> {
        // The status is plain data; a panic mid-update cannot leave it torn.
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// JobWriter
// ---------------------------------------------------------------------------

enum Outcome {
    Done(PathBuf),
    Failed(String),
}

/// The one handle allowed to mutate a job. Deliberately not `Clone`.
#[derive(Debug)]
pub struct JobWriter {
    job: Arc<JobHandle>,
    events: EventSender,
    finished: bool,
}

impl JobWriter {
    pub fn id(&self) -> &JobId {
        &self.job.id
    }

    pub fn mark_running(&self) {
        self.job.status().state = JobState::Running;
    }

    /// Push a progress event.
    pub fn progress(&self, update: ProgressUpdate) {
        if !self.events.send(update.into()) {
            tracing::trace!(job_id = %self.job.id, "Progress dropped, job no longer tracked");
        }
    }

    /// Record success and emit `Done`.
    pub fn complete(mut self, file: PathBuf) {
        self.finish(Outcome::Done(file));
    }

    /// Record failure and emit `Error`.
    pub fn fail(mut self, message: impl Into<String>) {
        self.finish(Outcome::Failed(message.into()));
    }

    fn finish(&mut self, outcome: Outcome) {
        let event = {
            let mut status = self.job.status();
            status.finished_at = Some(Utc::now());
            match outcome {
                Outcome::Done(file) => {
                    let filename = file
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    status.state = JobState::Done;
                    status.result_file = Some(file);
                    ProgressEvent::Done { filename }
                }
                Outcome::Failed(message) => {
                    status.state = JobState::Failed;
                    status.error_message = Some(message.clone());
                    ProgressEvent::Error { message }
                }
            }
        };
        // State is written before the event goes out, so a consumer that sees
        // the terminal event always finds the outcome stored.
        self.events.send(event);
        self.finished = true;
    }
}

impl Drop for JobWriter {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(job_id = %self.job.id, "Job writer dropped without an outcome");
            self.finish(Outcome::Failed(MSG_ABORTED.to_string()));
        }
    }
}
