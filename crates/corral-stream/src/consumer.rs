//! Stream consumer

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use corral_common::{Result, RetryConfig};
use corral_store::{EntryId, RemoteStore, StreamEntry};

use crate::handler::MessageHandler;

/// Consumer identity and tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Stream key to consume
    pub stream: String,
    /// Consumer group
    pub group: String,
    /// This consumer's name within the group
    pub consumer: String,
    /// Maximum entries fetched per read
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Poll timeout of the blocking read (millis)
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// Backoff applied when the store is unreachable
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_batch_size() -> usize {
    16
}

fn default_block_ms() -> u64 {
    2000
}

impl ConsumerConfig {
    pub fn new(
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            batch_size: default_batch_size(),
            block_ms: default_block_ms(),
            retry: RetryConfig::default(),
        }
    }
}

/// At-least-once consumer for one `(group, consumer)` pair.
///
/// All durable delivery state lives in the store; the consumer itself is
/// stateless and any number of them can share a group. Run `run` on one
/// dedicated task per pair, and schedule `reclaim_pending` (directly or via
/// `ReclaimTask`) from this or any other process to recover entries whose
/// owner crashed.
pub struct StreamConsumer {
    store: Arc<dyn RemoteStore>,
    config: ConsumerConfig,
    handler: Arc<dyn MessageHandler>,
}

impl StreamConsumer {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        config: ConsumerConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            store,
            config,
            handler,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// One read-and-dispatch cycle: fetch never-delivered entries (blocking
    /// up to `block_ms`) and run the handler on each. Returns the number of
    /// entries delivered; store failures propagate.
    pub async fn poll_once(&self) -> Result<usize> {
        let entries = self
            .store
            .stream_read_group(
                &self.config.stream,
                &self.config.group,
                &self.config.consumer,
                self.config.batch_size,
                self.config.block_ms,
            )
            .await?;

        let delivered = entries.len();
        for entry in &entries {
            self.dispatch(entry).await;
        }
        Ok(delivered)
    }

    /// Run the handler on one entry, acking on success. Handler errors are
    /// contained here: the entry stays pending and reclaim redelivers it.
    async fn dispatch(&self, entry: &StreamEntry) -> bool {
        match self.handler.handle(entry).await {
            Ok(()) => {
                counter!("corral_stream_handled_total").increment(1);
                if let Err(e) = self
                    .store
                    .stream_ack(&self.config.stream, &self.config.group, entry.id)
                    .await
                {
                    warn!("failed to ack entry {}: {}", entry.id, e);
                }
                true
            }
            Err(e) => {
                counter!("corral_stream_handler_failed_total").increment(1);
                warn!("handler failed for entry {}: {}", entry.id, e);
                false
            }
        }
    }

    /// Blocking delivery loop.
    ///
    /// Runs until `stop_rx` yields (or its sender drops). A failed handler
    /// never terminates the loop; store connectivity failures back off per
    /// the configured retry policy and the loop resumes when the store
    /// answers again.
    pub async fn run(&self, mut stop_rx: mpsc::Receiver<()>) {
        info!(
            "consumer '{}' starting on '{}' in group '{}'",
            self.config.consumer, self.config.stream, self.config.group
        );
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    info!("consumer '{}' stopping", self.config.consumer);
                    break;
                }
                result = self.poll_once() => {
                    match result {
                        Ok(_) => {
                            failures = 0;
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            let delay = self.config.retry.delay_for(failures);
                            error!(
                                "read failed for '{}' ({} consecutive): {}; backing off {} ms",
                                self.config.stream,
                                failures,
                                e,
                                delay.as_millis()
                            );
                            tokio::select! {
                                _ = stop_rx.recv() => break,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    /// Recover entries pending for at least `min_idle_ms`, whoever owns
    /// them: claim them for this consumer (bumping their delivery counts),
    /// re-run the handler, and ack the successes. Returns the number
    /// recovered.
    pub async fn reclaim_pending(&self, min_idle_ms: u64, max_count: usize) -> Result<usize> {
        let pending = self
            .store
            .stream_list_pending(&self.config.stream, &self.config.group, min_idle_ms, max_count)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let ids: Vec<EntryId> = pending.iter().map(|p| p.id).collect();
        let claimed = self
            .store
            .stream_claim(
                &self.config.stream,
                &self.config.group,
                &self.config.consumer,
                min_idle_ms,
                &ids,
            )
            .await?;
        counter!("corral_stream_reclaimed_total").increment(claimed.len() as u64);

        let mut recovered = 0;
        for entry in &claimed {
            if self.dispatch(entry).await {
                recovered += 1;
            }
        }
        debug!(
            "reclaim for group '{}': {} pending, {} claimed, {} recovered",
            self.config.group,
            pending.len(),
            claimed.len(),
            recovered
        );
        Ok(recovered)
    }
}
