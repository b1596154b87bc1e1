//! Lock manager

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use corral_common::{CorralError, Result};
use corral_store::RemoteStore;

use crate::model::{LockOptions, OwnerToken};

const LOCK_KEY_PREFIX: &str = "lock:";

/// Distributed lease lock client.
///
/// Stateless: every acquisition and release is an atomic store round trip,
/// so any number of processes can share one resource name safely. Mutual
/// exclusion holds as long as no holder outlives its lease and clock drift
/// between clients stays negligible relative to the lease.
pub struct LockManager {
    store: Arc<dyn RemoteStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    fn lock_key(resource: &str) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, resource)
    }

    /// Acquire the lock on `resource`, polling until the wait budget runs
    /// out.
    ///
    /// Returns the owner token proving the lease. `wait_ms = 0` makes
    /// exactly one attempt. An exhausted budget fails with
    /// `CorralError::AcquireTimeout`; the caller decides whether to retry.
    pub async fn acquire(&self, resource: &str, options: &LockOptions) -> Result<OwnerToken> {
        if options.lease_ms == 0 {
            return Err(CorralError::IllegalArgument(
                "lease_ms must be positive".to_string(),
            ));
        }

        let token = OwnerToken::generate();
        let key = Self::lock_key(resource);
        let started = Instant::now();
        let budget = Duration::from_millis(options.wait_ms);
        let poll_interval = Duration::from_millis(options.poll_interval_ms.max(1));

        loop {
            if self
                .store
                .try_set_if_absent(&key, token.as_str(), options.lease_ms)
                .await?
            {
                debug!("acquired '{}' with a {} ms lease", resource, options.lease_ms);
                counter!("corral_lock_acquired_total").increment(1);
                return Ok(token);
            }

            let elapsed = started.elapsed();
            if elapsed >= budget {
                counter!("corral_lock_timeout_total").increment(1);
                return Err(CorralError::AcquireTimeout {
                    resource: resource.to_string(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            // Never sleep past the budget; the attempt after the final
            // sleep lands right at the deadline
            tokio::time::sleep(poll_interval.min(budget - elapsed)).await;
        }
    }

    /// Release the lock on `resource` if `token` still owns it.
    ///
    /// One atomic compare-and-delete round trip. Returns whether the delete
    /// happened; `Ok(false)` means the lease had already expired or another
    /// owner holds the key now, which is an expected race, not an error.
    pub async fn release(&self, resource: &str, token: &OwnerToken) -> Result<bool> {
        let released = self
            .store
            .compare_and_delete(&Self::lock_key(resource), token.as_str())
            .await?;
        if !released {
            debug!("release of '{}' did not match the current holder", resource);
        }
        Ok(released)
    }

    /// Run `task` while holding the lock on `resource`, releasing it
    /// afterwards no matter how the task ends.
    ///
    /// Acquisition failure surfaces before the task runs. A panicking task
    /// still releases before the panic resumes. Release failures are logged
    /// and never escalate; the lease TTL caps how long the key can linger.
    pub async fn with_lock<F, Fut, T>(
        &self,
        resource: &str,
        options: &LockOptions,
        task: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.acquire(resource, options).await?;

        let outcome = AssertUnwindSafe(task()).catch_unwind().await;

        match self.release(resource, &token).await {
            Ok(true) => {}
            Ok(false) => warn!("lock '{}' was no longer held at release", resource),
            Err(e) => warn!("failed to release lock '{}': {}", resource, e),
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
