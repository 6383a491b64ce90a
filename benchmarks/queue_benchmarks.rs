use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use queuebus::queue::processing_list;
use queuebus::{EventBus, MemoryBroker, MessageQueue, QueueManager};

/// Raw enqueue throughput of the in-memory store.
fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");

    for capacity in [1000, 10000, 100000].iter() {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            capacity,
            |b, &capacity| {
                let payload = serde_json::json!({"event": "user.created", "id": 123});

                b.iter(|| {
                    let queue = MessageQueue::new("bench".to_string(), capacity);
                    for _ in 0..1000 {
                        let _ = queue.enqueue(black_box(payload.clone()));
                    }
                });
            },
        );
    }
    group.finish();
}

/// Dequeue into the processing list and acknowledge, as consumers do.
fn bench_dequeue_and_ack(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dequeue_and_ack");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("1000_messages", |b| {
        b.iter(|| {
            rt.block_on(async {
                let manager = QueueManager::new(1000, 10);
                let pending = processing_list("bench");
                for i in 0..1000 {
                    let _ = manager.enqueue("bench", serde_json::json!({"id": i}));
                }

                while let Ok(Some(body)) = manager
                    .dequeue_to_pending("bench", &pending, Duration::ZERO)
                    .await
                {
                    black_box(manager.ack_pending(&pending, &body));
                }
            });
        });
    });

    group.finish();
}

/// Publish cost through the facade, including serialization.
fn bench_publish(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("publish");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let broker = MemoryBroker::new(Arc::new(QueueManager::new(1_000_000, 10)));
            let bus = EventBus::new(Arc::new(broker));
            let payload = serde_json::json!({"data": "x".repeat(size)});

            b.iter(|| {
                rt.block_on(async {
                    let _ = black_box(bus.publish("bench", &payload).await);
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_dequeue_and_ack, bench_publish);

criterion_main!(benches);
