//! Message handler trait

use async_trait::async_trait;

use corral_store::StreamEntry;

/// Application callback invoked once per delivered entry.
///
/// Returning `Ok` acknowledges the entry; returning an error leaves it
/// pending for a later reclaim. Implementations must be idempotent: the
/// same entry can be delivered more than once, possibly out of order
/// relative to entries acknowledged in the meantime.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, entry: &StreamEntry) -> anyhow::Result<()>;
}
