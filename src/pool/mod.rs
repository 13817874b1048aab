//! Verifier pool: least-loaded routing over a fixed set of worker slots.
//!
//! # Architecture
//!
//! ```text
//! verify_balanced(sample)
//!        │
//!        ├── dispatch(sample, Format) ──┐
//!        └── dispatch(sample, Equation) ┤  (concurrent)
//!                                       ▼
//!                     acquire: min load (lowest index), load += 1
//!                                       │
//!                        worker.run() bounded by task_timeout
//!                      ┌────────────────┴────────────────┐
//!                    Ok(result)                   Err / timeout
//!                      │                                 │
//!         load -= 1 (same generation)   replace worker (same generation),
//!                      │                 audit sample, backoff, retry
//!                      ▼                                 │
//!                   result            attempts exhausted → zero reward
//! ```
//!
//! Slots carry a generation counter. A completion only decrements the load of
//! the generation it was routed to, and only the first failure for a given
//! generation replaces the worker, so loads never go negative and a slot is
//! never replaced twice for the same fault.

mod config;
pub mod error;
mod load;
mod manager;
mod orchestrator;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use config::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_MIN_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_POOL_NAME,
    DEFAULT_TASK_TIMEOUT_SECS, PoolConfig,
};
pub use error::{PoolError, PoolResult};
pub use load::LoadTracker;
pub use manager::VerifierPool;
pub use registry::{PoolRegistry, global_registry};
pub use types::{PoolStats, SlotInfo};
