use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-slot view in a [`PoolStats`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub slot: usize,
    pub worker_id: String,
    /// Bumped every time the slot's worker is replaced.
    pub generation: u64,
    /// In-flight tasks routed to the current worker.
    pub load: usize,
}

/// Point-in-time pool snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub shut_down: bool,
    pub slots: Vec<SlotInfo>,
    /// Attempts routed to a worker.
    pub dispatched: u64,
    /// Attempts that returned a result.
    pub succeeded: u64,
    /// Attempts that errored or timed out.
    pub failed_attempts: u64,
    /// Dispatches that ran out of attempts.
    pub exhausted: u64,
    /// Workers replaced after a failure.
    pub replacements: u64,
}

impl PoolStats {
    pub fn loads(&self) -> Vec<usize> {
        self.slots.iter().map(|s| s.load).collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) dispatched: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed_attempts: AtomicU64,
    pub(crate) exhausted: AtomicU64,
    pub(crate) replacements: AtomicU64,
}

impl PoolCounters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        // Relaxed: counters are diagnostics only; nothing synchronizes on them.
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
