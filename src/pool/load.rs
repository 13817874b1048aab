//! In-flight task counts per worker slot.
//!
//! `LoadTracker` is plain data; the pool keeps it behind its state mutex, so
//! [`acquire`](LoadTracker::acquire) (min-search plus increment) is one atomic step
//! with respect to other dispatches.

/// In-flight counts, one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadTracker {
    loads: Vec<usize>,
}

impl LoadTracker {
    /// Creates `slots` counters, all zero.
    pub fn new(slots: usize) -> Self {
        Self {
            loads: vec![0; slots],
        }
    }

    /// Picks the least-loaded slot (lowest index on ties) and increments it.
    ///
    /// Returns `None` when there are no slots.
    pub fn acquire(&mut self) -> Option<usize> {
        let slot = self
            .loads
            .iter()
            .enumerate()
            .min_by_key(|&(index, load)| (*load, index))
            .map(|(index, _)| index)?;
        self.loads[slot] += 1;
        Some(slot)
    }

    /// Decrements `slot`, never below zero.
    pub fn release(&mut self, slot: usize) {
        if let Some(load) = self.loads.get_mut(slot) {
            *load = load.saturating_sub(1);
        }
    }

    /// Sets `slot` back to zero (its worker was replaced).
    pub fn reset(&mut self, slot: usize) {
        if let Some(load) = self.loads.get_mut(slot) {
            *load = 0;
        }
    }

    /// Current count for `slot`.
    pub fn get(&self, slot: usize) -> Option<usize> {
        self.loads.get(slot).copied()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.loads.iter().sum()
    }

    /// Largest difference between any two slots.
    pub fn spread(&self) -> usize {
        let max = self.loads.iter().max().copied().unwrap_or(0);
        let min = self.loads.iter().min().copied().unwrap_or(0);
        max - min
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn snapshot(&self) -> Vec<usize> {
        self.loads.clone()
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.loads.clear();
    }
}
