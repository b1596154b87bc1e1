//! Periodic reclaim task
//!
//! Reclaim must run somewhere for abandoned entries to come back; TTLs
//! handle every other resource, but pending entries only move when a
//! consumer claims them. This task is the scheduled driver; run one per
//! group from any process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::warn;

use crate::consumer::StreamConsumer;

/// Periodic driver for `StreamConsumer::reclaim_pending`
pub struct ReclaimTask {
    consumer: Arc<StreamConsumer>,
    interval_ms: u64,
    min_idle_ms: u64,
    max_count: usize,
    stop_tx: mpsc::Sender<()>,
}

impl ReclaimTask {
    pub fn start(
        consumer: Arc<StreamConsumer>,
        interval_ms: u64,
        min_idle_ms: u64,
        max_count: usize,
    ) -> (Self, mpsc::Receiver<()>) {
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let task = Self {
            consumer,
            interval_ms,
            min_idle_ms,
            max_count,
            stop_tx,
        };

        (task, stop_rx)
    }

    pub async fn run(self, mut stop_rx: mpsc::Receiver<()>) {
        let mut interval = interval(Duration::from_millis(self.interval_ms));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self
                        .consumer
                        .reclaim_pending(self.min_idle_ms, self.max_count)
                        .await
                    {
                        warn!(
                            "reclaim failed for group '{}': {}",
                            self.consumer.config().group,
                            e
                        );
                    }
                }
                _ = stop_rx.recv() => {
                    break;
                }
            }
        }
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}
