//! Tally library crate (used by the server binary and integration tests).
//!
//! Scores RL samples with rule-based checks run on a fault-tolerant pool of
//! isolated verifier workers.
//!
//! ## Core Types
//! - [`Sample`], [`CheckKind`] - Records and the checks applied to them
//! - [`VerifierPool`], [`PoolConfig`] - Least-loaded worker pool with retry and replacement
//! - [`PoolRegistry`] - Named pools shared within a process
//! - [`FailureAuditLog`] - Locked JSONL log of samples whose verification failed
//! - [`Config`], [`ConfigError`] - Server configuration
//!
//! ## Verification
//! - [`verification::check_format`], [`verification::check_equation`] - The raw checks
//! - [`verification::verify`] - Reward-producing wrapper run inside workers
//!
//! ## Test/Mock Support
//! Mock workers are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod audit;
pub mod config;
pub mod gateway;
pub mod pool;
pub mod sample;
pub mod verification;
pub mod worker;

pub use audit::{AuditError, AuditOutcome, AuditResult, FailureAuditLog};
pub use config::{Config, ConfigError};
pub use pool::{
    LoadTracker, PoolConfig, PoolError, PoolRegistry, PoolResult, PoolStats, SlotInfo,
    VerifierPool, global_registry,
};
pub use sample::{CheckKind, Sample};
pub use verification::{ExprError, VerificationError};
#[cfg(any(test, feature = "mock"))]
pub use worker::{MockBehavior, MockWorker, MockWorkerFactory};
pub use worker::{
    ThreadWorker, ThreadWorkerFactory, VerifierWorker, WorkerError, WorkerFactory, WorkerResult,
};
