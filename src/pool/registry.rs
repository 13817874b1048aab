//! Process-wide lookup of named pools.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::info;

use super::config::PoolConfig;
use super::error::PoolResult;
use super::manager::VerifierPool;
use crate::worker::{ThreadWorkerFactory, WorkerFactory};

/// Named pools shared across callers.
///
/// The first `get_or_create` for a name builds the pool; later calls with the
/// same name get the same instance and their config is ignored. A registered
/// pool that was shut down is rebuilt on the next `get_or_create`.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<HashMap<String, Arc<VerifierPool>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pool named `config.name`, creating it from `config` if absent.
    pub fn get_or_create(&self, config: PoolConfig) -> PoolResult<Arc<VerifierPool>> {
        self.get_or_create_with(config, Arc::new(ThreadWorkerFactory::new()))
    }

    /// Like [`get_or_create`](Self::get_or_create), building with `factory`.
    pub fn get_or_create_with(
        &self,
        config: PoolConfig,
        factory: Arc<dyn WorkerFactory>,
    ) -> PoolResult<Arc<VerifierPool>> {
        let mut pools = self.pools.lock();
        match pools.get(&config.name) {
            Some(pool) if !pool.is_shut_down() => return Ok(Arc::clone(pool)),
            Some(_) => info!(pool = %config.name, "Registered pool was shut down, rebuilding"),
            None => {}
        }

        let name = config.name.clone();
        let pool = Arc::new(VerifierPool::with_factory(config, factory)?);
        pools.insert(name.clone(), Arc::clone(&pool));
        info!(pool = %name, "Registered verifier pool");
        Ok(pool)
    }

    /// Registers an already-built pool under its own name, returning any
    /// pool it displaced.
    pub fn insert(&self, pool: Arc<VerifierPool>) -> Option<Arc<VerifierPool>> {
        self.pools.lock().insert(pool.name().to_string(), pool)
    }

    pub fn get(&self, name: &str) -> Option<Arc<VerifierPool>> {
        self.pools.lock().get(name).cloned()
    }

    /// Unregisters and shuts down the pool named `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<VerifierPool>> {
        let pool = self.pools.lock().remove(name)?;
        pool.shutdown();
        Some(pool)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pools.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

static GLOBAL_REGISTRY: LazyLock<PoolRegistry> = LazyLock::new(PoolRegistry::new);

/// The process-wide registry.
pub fn global_registry() -> &'static PoolRegistry {
    &GLOBAL_REGISTRY
}
