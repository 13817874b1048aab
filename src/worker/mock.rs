//! Scriptable workers for exercising pool failure handling.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{WorkerError, WorkerResult};
use super::{VerifierWorker, WorkerFactory};
use crate::sample::{CheckKind, Sample};
use crate::verification;

/// What a mock worker instance does on every call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Runs the real verification functions.
    Verify,
    /// Returns [`WorkerError::Failed`].
    Fail,
    /// Returns [`WorkerError::Crashed`].
    Crash,
    /// Never replies.
    Hang,
    /// Sleeps, then verifies.
    Delay(Duration),
    /// Fails for one kind, verifies the other.
    FailKind(CheckKind),
    /// Sleeps, then fails.
    FailAfter(Duration),
    /// Fails `kind` checks on samples whose text contains `marker`.
    FailMatching { kind: CheckKind, marker: String },
}

/// A worker following a fixed [`MockBehavior`].
#[derive(Debug)]
pub struct MockWorker {
    id: String,
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockWorker {
    pub fn new(id: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn behavior(&self) -> &MockBehavior {
        &self.behavior
    }

    fn failed(&self, reason: &str) -> WorkerError {
        WorkerError::Failed {
            worker_id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl VerifierWorker for MockWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, sample: Sample, kind: CheckKind) -> WorkerResult<Sample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Verify => Ok(verification::verify(sample, kind)),
            MockBehavior::Fail => Err(self.failed("scripted failure")),
            MockBehavior::Crash => Err(WorkerError::Crashed {
                worker_id: self.id.clone(),
            }),
            MockBehavior::Hang => std::future::pending::<WorkerResult<Sample>>().await,
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(verification::verify(sample, kind))
            }
            MockBehavior::FailKind(failing) if *failing == kind => {
                Err(self.failed("scripted failure for kind"))
            }
            MockBehavior::FailKind(_) => Ok(verification::verify(sample, kind)),
            MockBehavior::FailAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Err(self.failed("scripted failure after delay"))
            }
            MockBehavior::FailMatching { kind: failing, marker }
                if *failing == kind && sample.sample_text.contains(marker.as_str()) =>
            {
                Err(self.failed("scripted failure for marked sample"))
            }
            MockBehavior::FailMatching { .. } => Ok(verification::verify(sample, kind)),
        }
    }
}

/// Factory handing out [`MockWorker`]s.
///
/// Each slot can carry a plan: a queue of behaviors consumed one per created
/// instance. Once a slot's plan is empty, its slot default (or the factory
/// default) applies.
pub struct MockWorkerFactory {
    default: MockBehavior,
    slot_defaults: HashMap<usize, MockBehavior>,
    plans: Mutex<HashMap<usize, VecDeque<MockBehavior>>>,
    created: Mutex<Vec<(usize, String)>>,
    calls: Arc<AtomicUsize>,
}

impl MockWorkerFactory {
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default,
            slot_defaults: HashMap::new(),
            plans: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Successive instances created for `slot` follow `plan` in order.
    pub fn with_slot_plan(mut self, slot: usize, plan: Vec<MockBehavior>) -> Self {
        self.plans.get_mut().insert(slot, plan.into());
        self
    }

    /// Instances for `slot` use `behavior` once its plan is exhausted.
    pub fn with_slot_default(mut self, slot: usize, behavior: MockBehavior) -> Self {
        self.slot_defaults.insert(slot, behavior);
        self
    }

    /// Number of workers created so far.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Number of workers created for `slot` so far.
    pub fn created_for(&self, slot: usize) -> usize {
        self.created.lock().iter().filter(|(s, _)| *s == slot).count()
    }

    /// Total `run` calls across all instances.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, slot: usize) -> MockBehavior {
        self.plans
            .lock()
            .get_mut(&slot)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.slot_defaults.get(&slot).cloned())
            .unwrap_or_else(|| self.default.clone())
    }
}

impl WorkerFactory for MockWorkerFactory {
    fn create(&self, slot: usize) -> WorkerResult<Arc<dyn VerifierWorker>> {
        let behavior = self.next_behavior(slot);
        let mut created = self.created.lock();
        let id = format!("mock_{}_{}", slot, created.len());
        created.push((slot, id.clone()));

        Ok(Arc::new(MockWorker {
            id,
            behavior,
            calls: Arc::clone(&self.calls),
        }))
    }
}
