use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::error::{PoolError, PoolResult};
use crate::audit::{DEFAULT_AUDIT_FILENAME, DEFAULT_LOCK_TIMEOUT_SECS};

/// Default name pools are registered under.
pub const DEFAULT_POOL_NAME: &str = "verifier_pool";
/// Default bound on a single worker call.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 30;
/// Default attempts per dispatch (one retry).
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;
/// Default lower bound of the retry backoff.
pub const DEFAULT_BACKOFF_MIN_MS: u64 = 100;
/// Default upper bound of the retry backoff.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq)]
/// Verifier pool configuration.
pub struct PoolConfig {
    /// Registry name; callers sharing a name share the pool.
    pub name: String,
    /// Number of worker slots.
    pub num_workers: usize,
    /// Bound on one worker call; exceeding it counts as a worker failure.
    pub task_timeout: Duration,
    /// Attempts per dispatch before returning a zero reward.
    pub max_attempts: usize,
    /// Backoff before a retry is drawn uniformly from `backoff_min..=backoff_max`.
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// If true, samples whose attempt failed are appended to the audit log.
    pub write_failed: bool,
    /// Audit log location (lock file is `<path>.lock`).
    pub audit_path: PathBuf,
    /// Bound on audit lock acquisition.
    pub audit_lock_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            num_workers: default_num_workers(),
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_min: Duration::from_millis(DEFAULT_BACKOFF_MIN_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            write_failed: false,
            audit_path: PathBuf::from(DEFAULT_AUDIT_FILENAME),
            audit_lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    const ENV_POOL_NAME: &'static str = "TALLY_POOL_NAME";
    const ENV_NUM_WORKERS: &'static str = "TALLY_NUM_WORKERS";
    const ENV_TASK_TIMEOUT_SECS: &'static str = "TALLY_TASK_TIMEOUT_SECS";
    const ENV_MAX_ATTEMPTS: &'static str = "TALLY_MAX_ATTEMPTS";
    const ENV_BACKOFF_MIN_MS: &'static str = "TALLY_BACKOFF_MIN_MS";
    const ENV_BACKOFF_MAX_MS: &'static str = "TALLY_BACKOFF_MAX_MS";
    const ENV_WRITE_FAILED: &'static str = "TALLY_WRITE_FAILED";
    const ENV_AUDIT_PATH: &'static str = "TALLY_AUDIT_PATH";
    const ENV_AUDIT_LOCK_TIMEOUT_SECS: &'static str = "TALLY_AUDIT_LOCK_TIMEOUT_SECS";

    /// Config with `num_workers` slots and defaults elsewhere.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Loads config from environment variables (with defaults).
    ///
    /// Unparseable values fall back to the default; [`validate`](Self::validate)
    /// catches values that parse but make no sense.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let name = env::var(Self::ENV_POOL_NAME)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.name);
        let num_workers = parse_env(Self::ENV_NUM_WORKERS).unwrap_or(defaults.num_workers);
        let task_timeout = parse_env(Self::ENV_TASK_TIMEOUT_SECS)
            .map(Duration::from_secs)
            .unwrap_or(defaults.task_timeout);
        let max_attempts = parse_env(Self::ENV_MAX_ATTEMPTS).unwrap_or(defaults.max_attempts);
        let backoff_min = parse_env(Self::ENV_BACKOFF_MIN_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_min);
        let backoff_max = parse_env(Self::ENV_BACKOFF_MAX_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_max);
        let write_failed = env::var(Self::ENV_WRITE_FAILED)
            .map(|s| s != "false" && s != "0" && !s.is_empty())
            .unwrap_or(defaults.write_failed);
        let audit_path = env::var(Self::ENV_AUDIT_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.audit_path);
        let audit_lock_timeout = parse_env(Self::ENV_AUDIT_LOCK_TIMEOUT_SECS)
            .map(Duration::from_secs)
            .unwrap_or(defaults.audit_lock_timeout);

        Self {
            name,
            num_workers,
            task_timeout,
            max_attempts,
            backoff_min,
            backoff_max,
            write_failed,
            audit_path,
            audit_lock_timeout,
        }
    }

    /// Checks basic invariants.
    pub fn validate(&self) -> PoolResult<()> {
        let invalid = |reason: &str| {
            Err(PoolError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.num_workers == 0 {
            return invalid("num_workers must be at least 1");
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1");
        }
        if self.task_timeout.is_zero() {
            return invalid("task_timeout must be non-zero");
        }
        if self.backoff_min > self.backoff_max {
            return invalid("backoff_min must not exceed backoff_max");
        }
        Ok(())
    }

    /// Worst-case latency of one dispatch: every attempt times out and every
    /// retry waits the maximum backoff.
    pub fn worst_case_latency(&self) -> Duration {
        let attempts = self.max_attempts as u32;
        self.task_timeout * attempts + self.backoff_max * attempts.saturating_sub(1)
    }

    #[cfg(any(test, feature = "mock"))]
    /// Small, fast settings for tests: short timeout, millisecond backoff.
    pub fn for_testing(num_workers: usize) -> Self {
        Self {
            name: format!("test_pool_{}", uuid::Uuid::new_v4()),
            num_workers,
            task_timeout: Duration::from_secs(2),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            write_failed: false,
            audit_path: PathBuf::from(DEFAULT_AUDIT_FILENAME),
            audit_lock_timeout: Duration::from_secs(1),
        }
    }
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_env<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    env::var(var_name).ok().and_then(|v| v.trim().parse().ok())
}
