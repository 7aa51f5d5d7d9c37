//! Ordered per-job event channel backed by `tokio::sync::mpsc`.
//!
//! The sender side is owned by the job's runner and dropped right after the
//! terminal event, which closes the channel. Consumers await events instead of
//! polling; a consumer's stream ends once the channel is closed and drained.
//!
//! Only one consumer reads at a time. A second consumer waits for the first
//! to detach and then continues with whatever has not been delivered yet.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use reelfetch_core::job::ProgressEvent;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

/// Create a connected sender/channel pair for one job.
pub fn job_channel() -> (EventSender, JobEventChannel) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        JobEventChannel {
            receiver: Arc::new(Mutex::new(rx)),
        },
    )
}

// ---------------------------------------------------------------------------
// EventSender
// ---------------------------------------------------------------------------

/// Writing half. Not `Clone`: a job has exactly one writer.
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSender {
    /// Append an event. Never blocks.
    ///
    /// Returns `false` if the reading half has been dropped (the job was
    /// evicted); the event is discarded in that case.
    pub fn send(&self, event: ProgressEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

// ---------------------------------------------------------------------------
// JobEventChannel
// ---------------------------------------------------------------------------

/// Reading half, shared by everyone who may consume the job's events.
#[derive(Debug)]
pub struct JobEventChannel {
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<ProgressEvent>>>,
}

impl JobEventChannel {
    /// Attach as the consumer, waiting for any current consumer to detach.
    pub async fn attach(&self) -> EventSubscription {
        EventSubscription {
            rx: Arc::clone(&self.receiver).lock_owned().await,
        }
    }

    /// A stream of undelivered events that attaches lazily on first poll.
    ///
    /// Ends once the terminal event has been delivered (or immediately, if
    /// it already was).
    pub fn stream(&self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let receiver = Arc::clone(&self.receiver);
        stream::once(async move { receiver.lock_owned().await }).flat_map(|rx| {
            stream::unfold(EventSubscription { rx }, |mut sub| async move {
                sub.recv().await.map(|event| (event, sub))
            })
        })
    }
}

/// Exclusive read access to a job's events.
#[derive(Debug)]
pub struct EventSubscription {
    rx: OwnedMutexGuard<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl EventSubscription {
    /// Next event, or `None` once the job has finished and everything has
    /// been delivered.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}
