use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit writer task failed: {0}")]
    Task(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
