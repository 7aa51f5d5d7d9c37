//! Job lifecycle states and the events streamed to clients.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressUpdate;

/// Stored when a job is rejected because the admission queue is full.
pub const MSG_QUEUE_FULL: &str = "Too many downloads queued. Try again shortly.";

/// Stored when a job's runner went away without recording an outcome.
pub const MSG_ABORTED: &str = "The download was aborted unexpectedly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// One frame of a job's event stream.
///
/// Serialized with a `type` discriminator:
/// `{"type":"progress","percent":42.5,"total":"10.2MiB","speed":null,"eta":null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        percent: f64,
        total: String,
        speed: Option<String>,
        eta: Option<String>,
    },
    Done {
        filename: String,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }
}

impl From<ProgressUpdate> for ProgressEvent {
    fn from(update: ProgressUpdate) -> Self {
        ProgressEvent::Progress {
            percent: update.percent,
            total: update.total,
            speed: update.speed,
            eta: update.eta,
        }
    }
}
