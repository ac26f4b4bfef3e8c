//! Event dispatch benchmark suite.
//!
//! Benchmarks delivery through the in-memory transport at different scales:
//! - Listener counts: 1, 16, 128
//! - Burst sizes: 100, 1000 messages
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use wsbridge::{Connection, ConnectionManager, EventKind, MemoryPeer, MemoryTransport};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 16, 128];
const BURST_SIZES: &[u64] = &[100, 1000];

// ============================================================================
// Setup
// ============================================================================

fn open_with_listeners(listeners: usize) -> (Connection, MemoryPeer, Arc<AtomicU64>) {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone());
    let connection = manager.open("ws://bench.local/").unwrap();
    let peer = transport.last_peer().unwrap();

    let delivered = Arc::new(AtomicU64::new(0));
    for _ in 0..listeners {
        let delivered = Arc::clone(&delivered);
        connection.on(EventKind::Message, move |_| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    peer.accept("");
    (connection, peer, delivered)
}

// ============================================================================
// Benchmark: Listener Fan-out
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for &listeners in LISTENER_COUNTS {
        for &burst in BURST_SIZES {
            let id = format!("{listeners}l_{burst}m");
            group.throughput(Throughput::Elements(burst));
            group.bench_with_input(
                BenchmarkId::new("messages", &id),
                &(listeners, burst),
                |b, &(listener_count, burst_size)| {
                    let (_connection, peer, delivered) = open_with_listeners(listener_count);
                    b.iter(|| {
                        for _ in 0..burst_size {
                            peer.message("tick");
                        }
                        black_box(delivered.load(Ordering::Relaxed))
                    });
                },
            );
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Echo Round Trip
// ============================================================================

fn bench_echo(c: &mut Criterion) {
    let mut group = c.benchmark_group("echo");

    group.bench_function("listener_send", |b| {
        let (connection, peer, _) = open_with_listeners(0);
        let echo = connection.clone();
        connection.on(EventKind::Message, move |event| {
            if let Some(payload) = event.payload() {
                let _ = echo.send(payload.clone());
            }
        });

        b.iter(|| {
            peer.message(black_box("ping"));
            black_box(peer.drain())
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Channel Subscription
// ============================================================================

fn bench_subscribe(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("subscribe");
    group.sample_size(20);

    for &burst in BURST_SIZES {
        group.throughput(Throughput::Elements(burst));
        group.bench_with_input(BenchmarkId::new("drain", burst), &burst, |b, &burst_size| {
            b.to_async(&rt).iter(|| async move {
                let (connection, peer, _) = open_with_listeners(0);
                let mut events = connection.subscribe();

                for _ in 0..burst_size {
                    peer.message("tick");
                }
                let _ = connection.close();
                peer.finish_close();

                let mut received = 0u64;
                while events.recv().await.is_some() {
                    received += 1;
                }
                black_box(received)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_echo, bench_subscribe);
criterion_main!(benches);
