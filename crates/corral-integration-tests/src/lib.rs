//! Shared utilities for the Corral integration tests

use std::sync::Arc;

use corral_lock::LockManager;
use corral_ratelimit::SlidingWindowLimiter;
use corral_store::MemoryStore;

/// Install a test-friendly tracing subscriber; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One shared store, as every process in a deployment would see it
pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn lock_manager(store: Arc<MemoryStore>) -> Arc<LockManager> {
    Arc::new(LockManager::new(store))
}

pub fn limiter(store: Arc<MemoryStore>) -> SlidingWindowLimiter {
    SlidingWindowLimiter::new(store)
}
