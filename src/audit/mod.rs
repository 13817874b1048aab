//! Failure audit log: best-effort JSONL record of samples that failed verification.
//!
//! Writers coordinate through an advisory `fs2` lock on a companion file
//! (`<log>.lock`) in the same directory, so several pools or processes can share
//! one log. Acquisition is bounded; on timeout the record is dropped. Nothing in
//! here affects reward values.

pub mod error;


pub use error::{AuditError, AuditResult};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::sample::Sample;

/// Default log file name, relative to the working directory.
pub const DEFAULT_AUDIT_FILENAME: &str = "failed_samples_verify.jsonl";
/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 20;
/// Interval between lock attempts while another writer holds it.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a [`FailureAuditLog::record`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The record was appended.
    Written,
    /// The lock was not acquired in time; the record was dropped.
    LockTimeout,
}

/// Append-only JSONL log guarded by a cross-process lock file.
#[derive(Debug, Clone)]
pub struct FailureAuditLog {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl FailureAuditLog {
    /// Creates a log at `path` with lock file `<path>.lock`.
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Appends `sample` as one JSON line.
    ///
    /// Runs on the blocking pool; the calling task only waits for the outcome.
    pub async fn record(&self, sample: &Sample) -> AuditResult<AuditOutcome> {
        let mut line = serde_json::to_string(sample)?;
        line.push('\n');

        let log = self.clone();
        let outcome = tokio::task::spawn_blocking(move || log.append_locked(line.as_bytes()))
            .await
            .map_err(|e| AuditError::Task(e.to_string()))??;

        match outcome {
            AuditOutcome::Written => debug!(path = %self.path.display(), "Recorded failed sample"),
            AuditOutcome::LockTimeout => warn!(
                lock = %self.lock_path.display(),
                timeout_secs = self.lock_timeout.as_secs_f64(),
                "Audit lock not acquired in time, dropping record"
            ),
        }
        Ok(outcome)
    }

    /// Reads back every record (diagnostics and tests).
    pub fn read_all(&self) -> AuditResult<Vec<Sample>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }

    fn append_locked(&self, line: &[u8]) -> AuditResult<AuditOutcome> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(io_error(&self.lock_path))?;

        if !self.acquire(&lock_file)? {
            return Ok(AuditOutcome::LockTimeout);
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut log| {
                log.write_all(line)?;
                log.flush()
            })
            .map_err(io_error(&self.path));

        // Closing the handle releases the lock as well; unlock explicitly first.
        let _ = FileExt::unlock(&lock_file);
        written.map(|_| AuditOutcome::Written)
    }

    fn acquire(&self, lock_file: &File) -> AuditResult<bool> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(true),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(AuditError::Io {
                        path: self.lock_path.clone(),
                        source,
                    });
                }
            }
        }
    }
}

impl Default for FailureAuditLog {
    fn default() -> Self {
        Self::new(
            DEFAULT_AUDIT_FILENAME,
            Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        )
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AuditError + use<> {
    let path = path.to_path_buf();
    move |source| AuditError::Io { path, source }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
