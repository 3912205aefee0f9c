//! Ordered store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvdoc_storage::{AtomicOperation, KeyPart, KeyRange, MemoryStore, OrderedStore};

fn key(i: usize) -> Vec<KeyPart> {
    vec![KeyPart::from("bench"), KeyPart::from(i as f64)]
}

fn populated(count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..count {
        store.set(&key(i), vec![0u8; 64]).unwrap();
    }
    store
}

/// Benchmark single writes.
fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_set");

    for size in [64, 256, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = MemoryStore::new();
            let data = vec![7u8; size];
            let mut i = 0;
            b.iter(|| {
                i += 1;
                black_box(store.set(&key(i), black_box(data.clone())).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark point reads in a populated store.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_get");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = populated(count);
            let probe = key(count / 2);
            b.iter(|| black_box(store.get(black_box(&probe)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark range listing.
fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_list");

    for count in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let store = populated(count);
            let range = KeyRange::prefix(&[KeyPart::from("bench")]);
            b.iter(|| black_box(store.list(&range, None).count()));
        });
    }

    group.finish();
}

/// Benchmark atomic batches.
fn bench_atomic(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_atomic");

    for batch in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let store = MemoryStore::new();
            b.iter(|| {
                let mut op = AtomicOperation::new(&store);
                for i in 0..batch {
                    op.set(key(i), vec![1u8; 32]);
                }
                black_box(op.commit().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_list, bench_atomic);

criterion_main!(benches);
