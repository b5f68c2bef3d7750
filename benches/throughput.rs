//! Throughput Benchmark for sweepcache
//!
//! This benchmark measures the shard store and the expiry sweep under
//! various workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sweepcache::storage::run_sweep;
use sweepcache::{EvictionPipeline, Expirable, ShardStore, SweepKind};

fn new_store(shards: usize) -> Arc<ShardStore<u64>> {
    let pipeline = EvictionPipeline::<u64>::start(
        Arc::new(|v: u64| {
            black_box(v);
        }),
        4,
        1024,
    )
    .expect("pipeline");
    Arc::new(ShardStore::new(shards, Arc::new(pipeline)))
}

/// Benchmark PUT operations
fn bench_put(c: &mut Criterion) {
    let store = new_store(16);
    let now = Instant::now();

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_new", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.put(i, Expirable::new(i, now, 3600));
            i += 1;
        });
    });

    group.bench_function("put_overwrite", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.put(i % 1_000, Expirable::new(i, now, 3600));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let store = new_store(16);
    let now = Instant::now();

    // Pre-populate with data
    for i in 0..100_000 {
        store.put(i, Expirable::new(i, now, 3600));
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.get(i % 100_000, now));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.get(1_000_000 + i, now));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let store = new_store(16);
    let now = Instant::now();

    // Pre-populate
    for i in 0..10_000 {
        store.put(i, Expirable::new(i, now, 3600));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                store.put(10_000 + i, Expirable::new(i, now, 3600));
            } else {
                // 80% reads
                black_box(store.get(i % 10_000, now));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = new_store(16);
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        let now = Instant::now();
                        for i in 0..10_000u64 {
                            let key = t * 1_000_000 + i;
                            store.put(key, Expirable::new(i, now, 3600));
                            store.get(key, now);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark sample and full sweeps over live keys
fn bench_sweep(c: &mut Criterion) {
    let store = new_store(16);
    let now = Instant::now();

    for i in 0..100_000 {
        store.put(i, Expirable::new(i, now, 3600));
    }

    let mut group = c.benchmark_group("sweep");

    group.bench_function("sample_16", |b| {
        b.iter(|| {
            black_box(run_sweep(&store, SweepKind::Sample, 16));
        });
    });

    group.bench_function("full_100k", |b| {
        b.iter(|| {
            black_box(run_sweep(&store, SweepKind::Full, 16));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_sweep,
);

criterion_main!(benches);
