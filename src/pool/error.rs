use thiserror::Error;

use crate::worker::WorkerError;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to initialize worker: {0}")]
    Worker(#[from] WorkerError),
}

pub type PoolResult<T> = Result<T, PoolError>;
