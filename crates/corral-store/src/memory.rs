//! In-memory store implementation
//!
//! Implements the full `RemoteStore` interface in-process. Used by tests and
//! by single-process deployments; multi-process deployments point the
//! components at a shared networked store instead.
//!
//! Expiry is lazy: a record past its TTL is treated as absent and purged the
//! next time its key is touched. No janitor task runs.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use corral_common::{CorralError, Result, now_millis};

use crate::model::{EntryId, PendingEntry, StreamEntry};
use crate::store::RemoteStore;

/// In-memory implementation of `RemoteStore`
pub struct MemoryStore {
    /// Plain keys (lock records)
    kv: DashMap<String, KvRecord>,
    /// Ordered sets (rate windows)
    zsets: DashMap<String, ZsetRecord>,
    /// Streams
    streams: DashMap<String, Arc<StreamRecord>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    OrderedSet,
    Stream,
}

struct KvRecord {
    value: String,
    expires_at: Option<i64>,
}

impl KvRecord {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct ZsetRecord {
    /// Scores keyed by member; range queries scan, which is fine at the
    /// window sizes rate limiting produces
    scores: HashMap<String, i64>,
    expires_at: Option<i64>,
}

impl ZsetRecord {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct StreamRecord {
    inner: Mutex<StreamInner>,
    /// Wakes blocked group reads when a publish lands
    notify: Notify,
}

#[derive(Default)]
struct StreamInner {
    entries: BTreeMap<EntryId, BTreeMap<String, String>>,
    last_id: EntryId,
    groups: HashMap<String, GroupState>,
}

struct GroupState {
    /// Highest id ever handed out to this group via a group read
    last_delivered: EntryId,
    pending: BTreeMap<EntryId, PendingState>,
}

struct PendingState {
    consumer: String,
    delivered_at: i64,
    delivery_count: u64,
}

impl StreamInner {
    fn next_id(&self, now: i64) -> EntryId {
        if now > self.last_id.ms {
            EntryId::new(now, 0)
        } else {
            EntryId::new(self.last_id.ms, self.last_id.seq + 1)
        }
    }

    fn group_mut(&mut self, group: &str) -> &mut GroupState {
        self.groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                last_delivered: EntryId::ZERO,
                pending: BTreeMap::new(),
            })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            kv: DashMap::new(),
            zsets: DashMap::new(),
            streams: DashMap::new(),
        }
    }

    /// Reject operations whose key is already in use with a different kind,
    /// purging expired records first so a dead key can be reused freely.
    fn check_kind(&self, key: &str, want: Kind) -> Result<()> {
        let now = now_millis();
        if want != Kind::Plain {
            self.kv.remove_if(key, |_, rec| rec.is_expired(now));
            if self.kv.contains_key(key) {
                return Err(CorralError::WrongKind(key.to_string()));
            }
        }
        if want != Kind::OrderedSet {
            self.zsets.remove_if(key, |_, rec| rec.is_expired(now));
            if self.zsets.contains_key(key) {
                return Err(CorralError::WrongKind(key.to_string()));
            }
        }
        if want != Kind::Stream && self.streams.contains_key(key) {
            return Err(CorralError::WrongKind(key.to_string()));
        }
        Ok(())
    }

    fn stream_record(&self, key: &str) -> Result<Arc<StreamRecord>> {
        self.check_kind(key, Kind::Stream)?;
        Ok(self.streams.entry(key.to_string()).or_default().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn try_set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        self.check_kind(key, Kind::Plain)?;
        let now = now_millis();
        let record = KvRecord {
            value: value.to_string(),
            expires_at: Some(now + ttl_ms as i64),
        };

        // The entry guard holds the shard lock, so check-and-set is one step
        match self.kv.entry(key.to_string()) {
            dashmap::Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(record);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.check_kind(key, Kind::Plain)?;
        let now = now_millis();
        let removed = self
            .kv
            .remove_if(key, |_, rec| !rec.is_expired(now) && rec.value == expected);
        Ok(removed.is_some())
    }

    async fn ordered_set_add(&self, key: &str, member: &str, score: i64) -> Result<()> {
        self.check_kind(key, Kind::OrderedSet)?;
        let now = now_millis();
        self.zsets.remove_if(key, |_, rec| rec.is_expired(now));
        let mut record = self.zsets.entry(key.to_string()).or_default();
        record.scores.insert(member.to_string(), score);
        Ok(())
    }

    async fn ordered_set_remove_below(&self, key: &str, upper_exclusive: i64) -> Result<u64> {
        self.check_kind(key, Kind::OrderedSet)?;
        let now = now_millis();
        self.zsets.remove_if(key, |_, rec| rec.is_expired(now));
        let Some(mut record) = self.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = record.scores.len();
        record.scores.retain(|_, score| *score >= upper_exclusive);
        Ok((before - record.scores.len()) as u64)
    }

    async fn ordered_set_count_in_range(&self, key: &str, min: i64, max: i64) -> Result<u64> {
        self.check_kind(key, Kind::OrderedSet)?;
        let now = now_millis();
        self.zsets.remove_if(key, |_, rec| rec.is_expired(now));
        let Some(record) = self.zsets.get(key) else {
            return Ok(0);
        };
        let count = record
            .scores
            .values()
            .filter(|score| min <= **score && **score <= max)
            .count();
        Ok(count as u64)
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> Result<bool> {
        let now = now_millis();
        self.kv.remove_if(key, |_, rec| rec.is_expired(now));
        if let Some(mut record) = self.kv.get_mut(key) {
            record.expires_at = Some(now + ttl_ms as i64);
            return Ok(true);
        }
        self.zsets.remove_if(key, |_, rec| rec.is_expired(now));
        if let Some(mut record) = self.zsets.get_mut(key) {
            record.expires_at = Some(now + ttl_ms as i64);
            return Ok(true);
        }
        // Streams do not expire; the log is append-only
        Ok(false)
    }

    async fn stream_publish(
        &self,
        stream_key: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<EntryId> {
        let record = self.stream_record(stream_key)?;
        let id = {
            let mut inner = record.inner.lock();
            let id = inner.next_id(now_millis());
            inner.entries.insert(id, fields);
            inner.last_id = id;
            id
        };
        record.notify.notify_waiters();
        Ok(id)
    }

    async fn stream_read_group(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        let deadline = Instant::now() + Duration::from_millis(block_ms);

        loop {
            let record = self.stream_record(stream_key)?;
            // Register for wakeup before checking, so a publish landing
            // between the check and the wait is not missed
            let notified = record.notify.notified();

            let batch = {
                let mut inner = record.inner.lock();
                let now = now_millis();
                let cursor = inner.group_mut(group).last_delivered;
                let batch: Vec<StreamEntry> = inner
                    .entries
                    .range((Excluded(cursor), Unbounded))
                    .take(max_count)
                    .map(|(id, fields)| StreamEntry::new(*id, fields.clone()))
                    .collect();
                if let Some(last) = batch.last() {
                    let state = inner.group_mut(group);
                    state.last_delivered = last.id;
                    for entry in &batch {
                        state.pending.insert(
                            entry.id,
                            PendingState {
                                consumer: consumer.to_string(),
                                delivered_at: now,
                                delivery_count: 1,
                            },
                        );
                    }
                }
                batch
            };

            if !batch.is_empty() {
                return Ok(batch);
            }
            if block_ms == 0 || Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }

    async fn stream_ack(&self, stream_key: &str, group: &str, id: EntryId) -> Result<bool> {
        let record = self.stream_record(stream_key)?;
        let mut inner = record.inner.lock();
        let Some(state) = inner.groups.get_mut(group) else {
            return Ok(false);
        };
        Ok(state.pending.remove(&id).is_some())
    }

    async fn stream_list_pending(
        &self,
        stream_key: &str,
        group: &str,
        min_idle_ms: u64,
        max_count: usize,
    ) -> Result<Vec<PendingEntry>> {
        let record = self.stream_record(stream_key)?;
        let inner = record.inner.lock();
        let Some(state) = inner.groups.get(group) else {
            return Ok(Vec::new());
        };
        let now = now_millis();
        let pending = state
            .pending
            .iter()
            .filter_map(|(id, p)| {
                let idle = (now - p.delivered_at).max(0) as u64;
                (idle >= min_idle_ms).then(|| PendingEntry {
                    id: *id,
                    consumer: p.consumer.clone(),
                    idle_ms: idle,
                    delivery_count: p.delivery_count,
                })
            })
            .take(max_count)
            .collect();
        Ok(pending)
    }

    async fn stream_claim(
        &self,
        stream_key: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[EntryId],
    ) -> Result<Vec<StreamEntry>> {
        let record = self.stream_record(stream_key)?;
        let mut inner = record.inner.lock();
        let StreamInner {
            entries, groups, ..
        } = &mut *inner;
        let Some(state) = groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let now = now_millis();
        let mut sorted_ids: Vec<EntryId> = ids.to_vec();
        sorted_ids.sort_unstable();
        sorted_ids.dedup();

        let mut claimed = Vec::new();
        for id in sorted_ids {
            let Some(p) = state.pending.get_mut(&id) else {
                continue;
            };
            let idle = (now - p.delivered_at).max(0) as u64;
            if idle < min_idle_ms {
                continue;
            }
            p.consumer = consumer.to_string();
            p.delivered_at = now;
            p.delivery_count += 1;
            if let Some(fields) = entries.get(&id) {
                claimed.push(StreamEntry::new(id, fields.clone()));
            }
        }
        Ok(claimed)
    }
}
