//! Bounded worker pool for extraction jobs.
//!
//! A fixed number of workers pull [`JobTask`]s from a bounded admission
//! queue. Submission never waits: when the queue is full the job is failed
//! on the spot and the caller gets [`CoreError::Unavailable`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use reelfetch_core::command::ExternalCommand;
use reelfetch_core::error::CoreError;
use reelfetch_core::job::MSG_QUEUE_FULL;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::job::JobWriter;
use crate::runner::ProcessRunner;

/// One unit of work: the job's writer and the command to run for it.
#[derive(Debug)]
pub struct JobTask {
    pub writer: JobWriter,
    pub command: ExternalCommand,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<JobTask>>>;

pub struct WorkerPool {
    queue: mpsc::Sender<JobTask>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing a queue of `capacity` waiting jobs.
    ///
    /// Both values are raised to at least 1. Must be called inside a Tokio
    /// runtime.
    pub fn start(size: usize, capacity: usize, runner: ProcessRunner) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx: SharedQueue = Arc::new(Mutex::new(rx));
        let runner = Arc::new(runner);

        let workers = (0..size.max(1))
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, Arc::clone(&rx), Arc::clone(&runner))))
            .collect();

        Self { queue: tx, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Hand a job to the pool without waiting.
    pub fn submit(&self, task: JobTask) -> Result<(), CoreError> {
        match self.queue.try_send(task) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(task)) => {
                tracing::warn!(job_id = %task.writer.id(), "Admission queue full, rejecting job");
                task.writer.fail(MSG_QUEUE_FULL);
                Err(CoreError::Unavailable(MSG_QUEUE_FULL.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                task.writer.fail("The download service is shutting down.");
                Err(CoreError::Unavailable("The download service is shutting down.".to_string()))
            }
        }
    }

    /// Stop all workers.
    ///
    /// In-flight jobs are cancelled (their child process is killed) and
    /// queued jobs are dropped; both end up failed through their writers.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(worker_id: usize, queue: SharedQueue, runner: Arc<ProcessRunner>) {
    tracing::debug!(worker_id, "Worker started");
    loop {
        let task = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(JobTask { writer, command }) = task else {
            break;
        };

        let job_id = writer.id().clone();
        tracing::debug!(worker_id, %job_id, "Worker picked up job");

        // A panicking runner drops its writer, which fails the job.
        if AssertUnwindSafe(runner.run(writer, command))
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!(worker_id, %job_id, "Job runner panicked");
        }
    }
    tracing::debug!(worker_id, "Worker stopped");
}
