//! Sliding window rate limiter

use std::sync::Arc;

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use corral_common::{CorralError, Result, now_millis};
use corral_store::RemoteStore;

const RATE_KEY_PREFIX: &str = "rate:";

/// Sliding-window rate limiter over the remote store.
///
/// Each accepted call records one window entry scored by its timestamp;
/// entries older than the window are trimmed on every check and the whole
/// per-identity key expires via TTL once the identity goes idle.
pub struct SlidingWindowLimiter {
    store: Arc<dyn RemoteStore>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    fn window_key(identity: &str) -> String {
        format!("{}{}", RATE_KEY_PREFIX, identity)
    }

    /// Decide whether `identity` may make one more call.
    ///
    /// The window is `[now - window_secs * 1000, now]`, lower bound
    /// inclusive. Admission is strict: a call is recorded only while the
    /// current count is below `max_requests`, so at most `max_requests`
    /// entries coexist inside the window. Rejected calls record nothing.
    ///
    /// Store failures propagate; the caller picks fail-open or fail-closed
    /// (fail-closed protects downstream capacity and is the safer default).
    ///
    /// The trim, count, and record steps are separate round trips, not one
    /// atomic operation: concurrent callers for the same identity can race
    /// between the count and the record and transiently admit more than
    /// `max_requests` in a window.
    pub async fn allow(
        &self,
        identity: &str,
        window_secs: u64,
        max_requests: u64,
    ) -> Result<bool> {
        if window_secs == 0 {
            return Err(CorralError::IllegalArgument(
                "window_secs must be positive".to_string(),
            ));
        }

        let key = Self::window_key(identity);
        let now = now_millis();
        let window_ms = (window_secs * 1000) as i64;
        let window_start = now - window_ms;

        self.store
            .ordered_set_remove_below(&key, window_start)
            .await?;
        let count = self
            .store
            .ordered_set_count_in_range(&key, window_start, now)
            .await?;

        if count >= max_requests {
            debug!("rejecting '{}': {} calls in window", identity, count);
            counter!("corral_ratelimit_rejected_total").increment(1);
            return Ok(false);
        }

        // Unique member so equal-timestamp calls never collide
        let member = format!("{}-{}", now, Uuid::new_v4());
        self.store.ordered_set_add(&key, &member, now).await?;
        self.store.expire(&key, window_ms as u64).await?;
        counter!("corral_ratelimit_admitted_total").increment(1);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use corral_store::MemoryStore;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_admits_up_to_max_then_rejects() {
        let limiter = limiter();

        for _ in 0..3 {
            assert!(limiter.allow("u1", 5, 3).await.unwrap());
        }
        assert!(!limiter.allow("u1", 5, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = limiter();

        for _ in 0..3 {
            assert!(limiter.allow("u1", 1, 3).await.unwrap());
        }
        assert!(!limiter.allow("u1", 1, 3).await.unwrap());

        // Wait for the window to slide past the recorded calls
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow("u1", 1, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = limiter();

        assert!(limiter.allow("u1", 5, 1).await.unwrap());
        assert!(!limiter.allow("u1", 5, 1).await.unwrap());
        assert!(limiter.allow("u2", 5, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_calls_record_nothing() {
        let limiter = limiter();

        assert!(limiter.allow("u1", 1, 1).await.unwrap());
        // Rejections do not extend the window occupancy
        for _ in 0..5 {
            assert!(!limiter.allow("u1", 1, 1).await.unwrap());
        }

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow("u1", 1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_window_rejected() {
        let limiter = limiter();
        let err = limiter.allow("u1", 0, 1).await.unwrap_err();
        assert!(matches!(err, CorralError::IllegalArgument(_)));
    }
}
