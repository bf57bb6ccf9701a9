//! Transaction benchmarks.

use arbor_bench::utils::{memory_store, random_data, random_tree, runtime, sibling_paths};
use arbor_core::{Path, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark committing a single leaf write.
fn bench_single_write(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("single_write");

    for size in [64usize, 256, 1024, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let store = memory_store();
            let data = Value::Bytes(random_data(size));

            b.iter(|| {
                rt.block_on(async {
                    let mut txn = store.begin();
                    txn.write("/bench/leaf", black_box(data.clone())).unwrap();
                    txn.commit().await.unwrap();
                });
            });
        });
    }
    group.finish();
}

/// Benchmark committing many sibling writes in one transaction.
fn bench_batch_write(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("batch_write");

    for batch_size in [10usize, 50, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                let store = memory_store();
                let paths = sibling_paths("/bench", batch_size);

                b.iter(|| {
                    rt.block_on(async {
                        let mut txn = store.begin();
                        for (n, path) in paths.iter().enumerate() {
                            txn.write(path, Value::from(n as i64)).unwrap();
                        }
                        txn.commit().await.unwrap();
                    });
                });
            },
        );
    }
    group.finish();
}

/// Benchmark replacing a populated subtree.
fn bench_subtree_replace(c: &mut Criterion) {
    let rt = runtime();
    let store = memory_store();
    rt.block_on(async {
        let mut txn = store.begin();
        txn.write("/bench", random_tree(4, 3, 32)).unwrap();
        txn.commit().await.unwrap();
    });

    c.bench_function("subtree_replace", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut txn = store.begin();
                txn.write("/bench", black_box(random_tree(4, 3, 32))).unwrap();
                txn.commit().await.unwrap();
            });
        });
    });
}

/// Benchmark reads served from the log and from the backend.
fn bench_read(c: &mut Criterion) {
    let rt = runtime();
    let store = memory_store();
    rt.block_on(async {
        let mut txn = store.begin();
        txn.write("/bench", random_tree(4, 3, 32)).unwrap();
        txn.commit().await.unwrap();
    });
    let path = Path::parse("/bench/n1/n2");

    let mut group = c.benchmark_group("read");
    group.bench_function("backend", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut txn = store.begin();
                black_box(txn.read(&path).await.unwrap());
            });
        });
    });
    group.bench_function("log", |b| {
        let mut txn = store.begin();
        txn.write("/bench", random_tree(4, 3, 32)).unwrap();
        b.iter(|| {
            rt.block_on(async {
                black_box(txn.read(&path).await.unwrap());
            });
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_single_write,
    bench_batch_write,
    bench_subtree_replace,
    bench_read,
);

criterion_main!(benches);
