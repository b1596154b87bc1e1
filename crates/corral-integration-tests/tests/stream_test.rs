//! At-least-once stream delivery scenarios

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use corral_store::{EntryId, MemoryStore, RemoteStore, StreamEntry};
use corral_stream::{ConsumerConfig, MessageHandler, ReclaimTask, StreamConsumer};

use corral_integration_tests::{init_tracing, memory_store};

struct Recording {
    seen: Mutex<Vec<EntryId>>,
}

impl Recording {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<EntryId> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for Recording {
    async fn handle(&self, entry: &StreamEntry) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(entry.id);
        Ok(())
    }
}

async fn publish(store: &MemoryStore, n: u32) -> EntryId {
    let mut fields = BTreeMap::new();
    fields.insert("n".to_string(), n.to_string());
    store.stream_publish("events", fields).await.unwrap()
}

fn consumer(
    store: Arc<MemoryStore>,
    name: &str,
    handler: Arc<dyn MessageHandler>,
) -> StreamConsumer {
    let mut config = ConsumerConfig::new("events", "workers", name);
    config.block_ms = 0;
    StreamConsumer::new(store, config, handler)
}

#[tokio::test]
async fn crashed_consumer_message_is_reclaimed_once() {
    init_tracing();
    let store = memory_store();

    let id = publish(&store, 1).await;

    // Consumer reads the message and dies before acking
    let read = store
        .stream_read_group("events", "workers", "crashed", 10, 0)
        .await
        .unwrap();
    assert_eq!(read.len(), 1);

    tokio::time::sleep(Duration::from_millis(40)).await;

    let handler = Recording::new();
    let rescuer = consumer(store.clone(), "rescuer", handler.clone());

    assert_eq!(rescuer.reclaim_pending(20, 100).await.unwrap(), 1);
    assert_eq!(handler.seen(), vec![id]);

    // Delivered and acked: nothing left to reclaim
    assert_eq!(rescuer.reclaim_pending(0, 100).await.unwrap(), 0);
    assert!(
        store
            .stream_list_pending("events", "workers", 0, 100)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn delivery_loop_processes_in_publish_order() {
    init_tracing();
    let store = memory_store();
    let handler = Recording::new();

    let mut config = ConsumerConfig::new("events", "workers", "c1");
    config.block_ms = 50;
    let worker = Arc::new(StreamConsumer::new(
        store.clone(),
        config,
        handler.clone() as Arc<dyn MessageHandler>,
    ));

    let (stop_tx, stop_rx) = mpsc::channel(1);
    let runner = worker.clone();
    let handle = tokio::spawn(async move { runner.run(stop_rx).await });

    let mut published = Vec::new();
    for n in 0..5 {
        published.push(publish(&store, n).await);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    stop_tx.send(()).await.unwrap();
    handle.await.unwrap();

    assert_eq!(handler.seen(), published);
}

#[tokio::test]
async fn reclaim_task_drains_abandoned_messages() {
    init_tracing();
    let store = memory_store();

    let mut abandoned = Vec::new();
    for n in 0..3 {
        abandoned.push(publish(&store, n).await);
    }
    store
        .stream_read_group("events", "workers", "crashed", 10, 0)
        .await
        .unwrap();

    let handler = Recording::new();
    let rescuer = Arc::new(consumer(store.clone(), "rescuer", handler.clone()));

    let (task, stop_rx) = ReclaimTask::start(rescuer, 25, 25, 100);
    let handle = tokio::spawn(async move { task.run(stop_rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();
    let _ = handle.await;

    let mut seen = handler.seen();
    seen.sort_unstable();
    assert_eq!(seen, abandoned);
    assert!(
        store
            .stream_list_pending("events", "workers", 0, 100)
            .await
            .unwrap()
            .is_empty()
    );
}
