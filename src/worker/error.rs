use std::time::Duration;

use thiserror::Error;

/// Resource-level worker failures observed by the pool.
///
/// Check-level problems never show up here; they score zero inside the
/// verification function.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {worker_id} is no longer accepting tasks")]
    Disconnected { worker_id: String },

    #[error("worker {worker_id} dropped the task without replying")]
    Crashed { worker_id: String },

    #[error("worker {worker_id} did not reply within {timeout:?}")]
    Timeout { worker_id: String, timeout: Duration },

    #[error("failed to spawn worker for slot {slot}: {source}")]
    Spawn {
        slot: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {worker_id} failed: {reason}")]
    Failed { worker_id: String, reason: String },
}

pub type WorkerResult<T> = Result<T, WorkerError>;
