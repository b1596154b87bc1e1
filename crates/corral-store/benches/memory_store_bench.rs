use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use corral_store::{MemoryStore, RemoteStore};

fn bench_lock_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());

    c.bench_function("lock_acquire_release_round_trip", |b| {
        let store = store.clone();
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move {
                store
                    .try_set_if_absent("bench:lock", "token", 30000)
                    .await
                    .unwrap();
                store
                    .compare_and_delete("bench:lock", "token")
                    .await
                    .unwrap();
            }
        });
    });
}

fn bench_window_trim_count(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());

    rt.block_on(async {
        for i in 0..1000i64 {
            store
                .ordered_set_add("bench:window", &format!("m{}", i), i)
                .await
                .unwrap();
        }
    });

    c.bench_function("window_trim_then_count", |b| {
        let store = store.clone();
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move {
                store
                    .ordered_set_remove_below("bench:window", 0)
                    .await
                    .unwrap();
                store
                    .ordered_set_count_in_range("bench:window", 0, i64::MAX)
                    .await
                    .unwrap();
            }
        });
    });
}

fn bench_publish_read_ack(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());

    c.bench_function("stream_publish_read_ack", |b| {
        let store = store.clone();
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move {
                let mut fields = BTreeMap::new();
                fields.insert("k".to_string(), "v".to_string());
                let id = store.stream_publish("bench:s", fields).await.unwrap();
                store
                    .stream_read_group("bench:s", "g", "c", 16, 0)
                    .await
                    .unwrap();
                store.stream_ack("bench:s", "g", id).await.unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_lock_round_trip,
    bench_window_trim_count,
    bench_publish_read_ack
);
criterion_main!(benches);
