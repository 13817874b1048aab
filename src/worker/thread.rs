//! Thread-backed verifier worker.
//!
//! Each [`ThreadWorker`] owns one OS thread that pulls jobs from a bounded queue
//! and runs a [`VerifyFn`] per job. A panic ends the thread; queued and in-flight
//! callers then see [`WorkerError::Crashed`] or [`WorkerError::Disconnected`]
//! while every other worker keeps running. Dropping the last handle closes the
//! queue and the thread exits after its current job.

use std::thread;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::error::{WorkerError, WorkerResult};
use super::{VerifierWorker, WorkerFactory};
use crate::sample::{CheckKind, Sample};
use crate::verification;

/// Function executed by a worker thread for every job.
pub type VerifyFn = fn(Sample, CheckKind) -> Sample;

/// Jobs a worker may hold queued before senders wait.
pub const WORKER_QUEUE_CAPACITY: usize = 64;

struct Job {
    sample: Sample,
    kind: CheckKind,
    reply: oneshot::Sender<Sample>,
}

/// Worker backed by a dedicated thread.
pub struct ThreadWorker {
    id: String,
    jobs: mpsc::Sender<Job>,
}

impl ThreadWorker {
    /// Spawns a worker running [`verification::verify`].
    pub fn spawn(slot: usize) -> WorkerResult<Self> {
        Self::spawn_with(slot, verification::verify)
    }

    /// Spawns a worker running `handler` instead of the built-in checks.
    pub fn spawn_with(slot: usize, handler: VerifyFn) -> WorkerResult<Self> {
        let id = format!("verifier_{}_{}", slot, uuid::Uuid::new_v4());
        let (jobs, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);

        let thread_id = id.clone();
        thread::Builder::new()
            .name(format!("tally-verifier-{}", slot))
            .spawn(move || run_jobs(thread_id, rx, handler))
            .map_err(|source| WorkerError::Spawn { slot, source })?;

        info!(slot, worker_id = %id, "Initialized verifier worker");
        Ok(Self { id, jobs })
    }
}

fn run_jobs(id: String, mut rx: mpsc::Receiver<Job>, handler: VerifyFn) {
    while let Some(job) = rx.blocking_recv() {
        let result = handler(job.sample, job.kind);
        // The caller may have timed out and gone away.
        let _ = job.reply.send(result);
    }
    debug!(worker_id = %id, "Verifier worker queue closed, thread exiting");
}

#[async_trait]
impl VerifierWorker for ThreadWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, sample: Sample, kind: CheckKind) -> WorkerResult<Sample> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job {
                sample,
                kind,
                reply,
            })
            .await
            .map_err(|_| WorkerError::Disconnected {
                worker_id: self.id.clone(),
            })?;

        response.await.map_err(|_| WorkerError::Crashed {
            worker_id: self.id.clone(),
        })
    }
}

impl std::fmt::Debug for ThreadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorker")
            .field("id", &self.id)
            .field("closed", &self.jobs.is_closed())
            .finish()
    }
}

/// Factory producing [`ThreadWorker`]s.
#[derive(Debug, Clone, Copy)]
pub struct ThreadWorkerFactory {
    handler: VerifyFn,
}

impl ThreadWorkerFactory {
    pub fn new() -> Self {
        Self {
            handler: verification::verify,
        }
    }

    /// Factory whose workers run `handler`.
    pub fn with_handler(handler: VerifyFn) -> Self {
        Self { handler }
    }
}

impl Default for ThreadWorkerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerFactory for ThreadWorkerFactory {
    fn create(&self, slot: usize) -> WorkerResult<std::sync::Arc<dyn VerifierWorker>> {
        Ok(std::sync::Arc::new(ThreadWorker::spawn_with(
            slot,
            self.handler,
        )?))
    }
}
