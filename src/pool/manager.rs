use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::config::PoolConfig;
use super::error::PoolResult;
use super::load::LoadTracker;
use super::types::{PoolCounters, PoolStats, SlotInfo};
use crate::audit::FailureAuditLog;
use crate::sample::{CheckKind, Sample};
use crate::worker::{ThreadWorkerFactory, VerifierWorker, WorkerError, WorkerFactory};

struct Slot {
    worker: Arc<dyn VerifierWorker>,
    generation: u64,
}

struct PoolState {
    slots: Vec<Slot>,
    loads: LoadTracker,
}

/// A routed attempt: the slot, the generation it was routed to, and the worker.
///
/// Dropping the lease gives the slot's load back, whether the attempt finished
/// or the dispatch future was cancelled mid-call. The release is keyed on the
/// captured generation, so a slot replaced in between is never decremented.
struct Lease<'a> {
    pool: &'a VerifierPool,
    slot: usize,
    generation: u64,
    worker: Arc<dyn VerifierWorker>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.slot, self.generation);
    }
}

/// Fixed-size pool of verifier workers with least-loaded routing.
///
/// Routing state (slot occupants and load counts) sits behind one mutex that is
/// held only for select+increment, decrement, or replacement; never across a
/// worker call.
pub struct VerifierPool {
    config: PoolConfig,
    factory: Arc<dyn WorkerFactory>,
    state: Mutex<PoolState>,
    audit: Option<FailureAuditLog>,
    audit_writes: Mutex<JoinSet<()>>,
    counters: PoolCounters,
    shut_down: AtomicBool,
}

impl VerifierPool {
    /// Creates a pool of `num_workers` thread-backed workers with default settings.
    pub fn initialize(num_workers: usize) -> PoolResult<Self> {
        Self::new(PoolConfig::with_workers(num_workers))
    }

    /// Creates a pool of thread-backed workers.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        Self::with_factory(config, Arc::new(ThreadWorkerFactory::new()))
    }

    /// Creates a pool whose workers come from `factory`.
    pub fn with_factory(config: PoolConfig, factory: Arc<dyn WorkerFactory>) -> PoolResult<Self> {
        config.validate()?;

        let slots = (0..config.num_workers)
            .map(|slot| {
                factory.create(slot).map(|worker| Slot {
                    worker,
                    generation: 0,
                })
            })
            .collect::<Result<Vec<_>, WorkerError>>()?;

        let audit = config.write_failed.then(|| {
            FailureAuditLog::new(config.audit_path.clone(), config.audit_lock_timeout)
        });

        info!(
            pool = %config.name,
            workers = config.num_workers,
            timeout_secs = config.task_timeout.as_secs_f64(),
            max_attempts = config.max_attempts,
            audit = config.write_failed,
            "Verifier pool initialized"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                loads: LoadTracker::new(slots.len()),
                slots,
            }),
            config,
            factory,
            audit,
            audit_writes: Mutex::new(JoinSet::new()),
            counters: PoolCounters::default(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of live slots (zero after shutdown).
    pub fn num_workers(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Returns the audit log, if failed-sample auditing is enabled.
    pub fn audit_log(&self) -> Option<&FailureAuditLog> {
        self.audit.as_ref()
    }

    /// Runs one `kind` check on a copy of `sample`.
    ///
    /// Each attempt goes to the least-loaded worker and is bounded by the task
    /// timeout. A failed or timed-out attempt replaces that worker, is audited
    /// in the background (when enabled), and is retried after a random backoff.
    /// Once attempts run out the result carries a zero reward for `kind`.
    /// Never fails.
    pub async fn dispatch(&self, sample: &Sample, kind: CheckKind) -> Sample {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            let Some(lease) = self.acquire() else {
                warn!(pool = %self.config.name, %kind, "Pool is shut down, returning zero reward");
                return sample.zero_reward(kind);
            };
            PoolCounters::bump(&self.counters.dispatched);
            debug!(
                slot = lease.slot,
                worker_id = lease.worker.id(),
                %kind,
                attempt,
                "Routed verification task"
            );

            let started = Instant::now();
            let outcome =
                match time::timeout(self.config.task_timeout, lease.worker.run(sample.clone(), kind))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(WorkerError::Timeout {
                        worker_id: lease.worker.id().to_string(),
                        timeout: self.config.task_timeout,
                    }),
                };

            match outcome {
                Ok(verified) => {
                    PoolCounters::bump(&self.counters.succeeded);
                    debug!(
                        slot = lease.slot,
                        %kind,
                        reward = verified.reward_for(kind),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Verification task completed"
                    );
                    drop(lease);
                    return verified;
                }
                Err(err) => {
                    PoolCounters::bump(&self.counters.failed_attempts);
                    warn!(
                        pool = %self.config.name,
                        slot = lease.slot,
                        worker_id = lease.worker.id(),
                        %kind,
                        attempt,
                        error = %err,
                        "Verifier worker failed, replacing"
                    );
                    self.replace_worker(lease.slot, lease.generation);
                    drop(lease);
                    self.record_failure(sample);

                    if attempt < max_attempts {
                        time::sleep(self.backoff()).await;
                    }
                }
            }
        }

        PoolCounters::bump(&self.counters.exhausted);
        error!(
            pool = %self.config.name,
            %kind,
            attempts = max_attempts,
            "Verification attempts exhausted, returning zero reward"
        );
        sample.zero_reward(kind)
    }

    /// Returns a snapshot of slots, loads and counters.
    pub fn stats(&self) -> PoolStats {
        let slots = {
            let state = self.state.lock();
            state
                .slots
                .iter()
                .enumerate()
                .map(|(index, slot)| SlotInfo {
                    slot: index,
                    worker_id: slot.worker.id().to_string(),
                    generation: slot.generation,
                    load: state.loads.get(index).unwrap_or(0),
                })
                .collect()
        };

        PoolStats {
            name: self.config.name.clone(),
            shut_down: self.is_shut_down(),
            slots,
            dispatched: PoolCounters::read(&self.counters.dispatched),
            succeeded: PoolCounters::read(&self.counters.succeeded),
            failed_attempts: PoolCounters::read(&self.counters.failed_attempts),
            exhausted: PoolCounters::read(&self.counters.exhausted),
            replacements: PoolCounters::read(&self.counters.replacements),
        }
    }

    /// Current in-flight counts per slot.
    pub fn loads(&self) -> Vec<usize> {
        self.state.lock().loads.snapshot()
    }

    /// Tears down every slot (idempotent). Later dispatches score zero.
    ///
    /// In-flight calls keep their worker handle and finish or time out normally.
    pub fn shutdown(&self) -> usize {
        // AcqRel: only the first caller tears down; later callers see the flag.
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let mut state = self.state.lock();
        let torn_down = state.slots.len();
        state.slots.clear();
        state.loads.clear();
        info!(pool = %self.config.name, workers = torn_down, "Verifier pool shut down");
        torn_down
    }

    /// Waits for background audit writes started so far.
    ///
    /// Pending writes are aborted when the pool is dropped, so callers that
    /// need every record on disk flush first.
    pub async fn flush_audit(&self) {
        let mut pending = std::mem::take(&mut *self.audit_writes.lock());
        while pending.join_next().await.is_some() {}
    }

    fn acquire(&self) -> Option<Lease<'_>> {
        let mut state = self.state.lock();
        let slot = state.loads.acquire()?;
        let occupant = &state.slots[slot];
        Some(Lease {
            pool: self,
            slot,
            generation: occupant.generation,
            worker: Arc::clone(&occupant.worker),
        })
    }

    fn release(&self, slot: usize, generation: u64) {
        let mut state = self.state.lock();
        let current = state.slots.get(slot).map(|s| s.generation);
        if current == Some(generation) {
            state.loads.release(slot);
        }
    }

    /// Replaces the worker in `slot` if it is still the `generation` that failed.
    fn replace_worker(&self, slot: usize, generation: u64) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(occupant) = state.slots.get_mut(slot) else {
            return;
        };
        if occupant.generation != generation {
            debug!(slot, generation, "Slot already replaced by another task");
            return;
        }

        match self.factory.create(slot) {
            Ok(worker) => {
                info!(
                    slot,
                    old_worker = occupant.worker.id(),
                    new_worker = worker.id(),
                    "Replaced verifier worker"
                );
                occupant.worker = worker;
                occupant.generation += 1;
                state.loads.reset(slot);
                PoolCounters::bump(&self.counters.replacements);
            }
            Err(e) => {
                error!(slot, error = %e, "Failed to replace verifier worker, keeping previous occupant");
            }
        }
    }

    /// Queues an audit write; the lock wait never delays the retry.
    fn record_failure(&self, sample: &Sample) {
        let Some(audit) = self.audit.clone() else {
            return;
        };
        let sample = sample.clone();

        let mut pending = self.audit_writes.lock();
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = audit.record(&sample).await {
                warn!(path = %audit.path().display(), error = %e, "Failed to write audit record");
            }
        });
    }

    fn backoff(&self) -> Duration {
        let min = self.config.backoff_min.as_millis() as u64;
        let max = self.config.backoff_max.as_millis() as u64;
        if min >= max {
            return self.config.backoff_min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl std::fmt::Debug for VerifierPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierPool")
            .field("name", &self.config.name)
            .field("workers", &self.num_workers())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
