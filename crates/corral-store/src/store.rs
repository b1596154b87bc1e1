//! The remote store interface
//!
//! Every Corral component talks to a shared store through this trait and
//! nothing else. Each method is one independent operation; the atomicity
//! notes on each method are the contract an implementation must honor; the
//! coordination guarantees of the lock, limiter, and consumer all rest on
//! them. No operation spans multiple keys transactionally.
//!
//! All TTLs are milliseconds. Keys live in one shared keyspace; using a key
//! with operations of a different kind fails with `CorralError::WrongKind`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use corral_common::Result;

use crate::model::{EntryId, PendingEntry, StreamEntry};

/// Atomic primitives of the shared remote store.
///
/// Implementations must be safe for concurrent use from many tasks; handles
/// are passed around as `Arc<dyn RemoteStore>` and constructed once per
/// process (no ambient globals).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Set `key` to `value` with expiry `ttl_ms`, only if the key is absent.
    ///
    /// The existence check and the write are one atomic step. Returns whether
    /// the write happened.
    async fn try_set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Comparison and deletion are one atomic server-side step; a
    /// get-then-delete sequence cannot implement this method. Returns whether
    /// the delete happened; an absent key or a value mismatch is `false`, not
    /// an error.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Add `member` to the ordered set at `key` with the given score,
    /// updating the score if the member exists.
    async fn ordered_set_add(&self, key: &str, member: &str, score: i64) -> Result<()>;

    /// Remove every member scored strictly below `upper_exclusive`.
    /// Returns the number removed.
    async fn ordered_set_remove_below(&self, key: &str, upper_exclusive: i64) -> Result<u64>;

    /// Count members scored within `[min, max]`, both bounds inclusive.
    async fn ordered_set_count_in_range(&self, key: &str, min: i64, max: i64) -> Result<u64>;

    /// Reset the TTL of an existing key. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl_ms: u64) -> Result<bool>;

    /// Append `fields` to the stream at `stream_key`.
    ///
    /// The returned id is strictly greater than every id previously assigned
    /// in this stream. The log is append-only; consumption never removes
    /// entries from it.
    async fn stream_publish(
        &self,
        stream_key: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<EntryId>;

    /// Read entries never before delivered to `group`, assigning them to
    /// `consumer` as pending.
    ///
    /// Blocks cooperatively for up to `block_ms` waiting for new entries
    /// (`block_ms = 0` returns immediately); an empty result after the
    /// timeout is normal. The group is created implicitly on first use and
    /// starts from the beginning of the stream. Entries are returned in
    /// increasing id order and each delivery marks the entry pending for
    /// `consumer` with a delivery count of 1.
    async fn stream_read_group(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>>;

    /// Acknowledge `id` for `group`, removing it from the pending set.
    ///
    /// Idempotent: acking an unknown or already-acked id returns `false`,
    /// not an error.
    async fn stream_ack(&self, stream_key: &str, group: &str, id: EntryId) -> Result<bool>;

    /// List entries of `group` that have been pending for at least
    /// `min_idle_ms`, regardless of their current consumer, in id order.
    async fn stream_list_pending(
        &self,
        stream_key: &str,
        group: &str,
        min_idle_ms: u64,
        max_count: usize,
    ) -> Result<Vec<PendingEntry>>;

    /// Atomically reassign pending entries to `consumer`.
    ///
    /// For each id still pending and idle for at least `min_idle_ms`, the
    /// owner becomes `consumer`, the delivery count is incremented, and the
    /// idle clock resets. Ids that no longer qualify (acked meanwhile, or
    /// delivered again too recently) are skipped. Returns the claimed
    /// entries in id order.
    async fn stream_claim(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[EntryId],
    ) -> Result<Vec<StreamEntry>>;
}
