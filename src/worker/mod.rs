//! Verifier workers: isolated units that run one verification per call.
//!
//! The pool only sees the [`VerifierWorker`] trait. Workers hold no state across
//! calls beyond their identity, so replacing one is always safe; the pool asks a
//! [`WorkerFactory`] for a fresh instance whenever a slot's occupant fails.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod thread;


pub use error::{WorkerError, WorkerResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBehavior, MockWorker, MockWorkerFactory};
pub use thread::{ThreadWorker, ThreadWorkerFactory, VerifyFn, WORKER_QUEUE_CAPACITY};

use std::sync::Arc;

use async_trait::async_trait;

use crate::sample::{CheckKind, Sample};

#[async_trait]
/// A single-purpose verification executor.
pub trait VerifierWorker: Send + Sync {
    /// Identity of this instance (unique across replacements).
    fn id(&self) -> &str;

    /// Runs the `kind` check on `sample` and returns it with the reward set.
    ///
    /// Check failures score zero and return `Ok`. `Err` is reserved for the
    /// worker itself failing (crash, closed queue).
    async fn run(&self, sample: Sample, kind: CheckKind) -> WorkerResult<Sample>;
}

/// Builds workers for pool slots.
pub trait WorkerFactory: Send + Sync {
    /// Creates a fresh worker to occupy `slot`.
    fn create(&self, slot: usize) -> WorkerResult<Arc<dyn VerifierWorker>>;
}
