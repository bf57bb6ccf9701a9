//! Tree codec benchmarks.

use arbor_bench::utils::random_tree;
use arbor_codec::{compose, flatten, from_cbor, to_canonical_cbor, KeyCodec, Path};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark canonical encoding and decoding of whole trees.
fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");

    for width in [2usize, 4, 8] {
        let value = random_tree(width, 3, 16);
        let bytes = to_canonical_cbor(&value).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", width), &value, |b, value| {
            b.iter(|| black_box(to_canonical_cbor(black_box(value)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", width), &bytes, |b, bytes| {
            b.iter(|| black_box(from_cbor(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark splitting trees into per-node entries and back.
fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");

    for width in [2usize, 4, 8] {
        let value = random_tree(width, 3, 16);
        let entries = flatten(&value);
        group.throughput(Throughput::Elements(entries.len() as u64));

        group.bench_with_input(BenchmarkId::new("flatten", width), &value, |b, value| {
            b.iter(|| black_box(flatten(black_box(value))));
        });
        group.bench_with_input(BenchmarkId::new("compose", width), &entries, |b, entries| {
            b.iter(|| black_box(compose(black_box(entries.clone()))));
        });
    }
    group.finish();
}

/// Benchmark path key encoding.
fn bench_keys(c: &mut Criterion) {
    let codec = KeyCodec::new(b"arbor/".to_vec());
    let path = Path::parse("/tenants/acme/users/alice/settings/theme");
    let key = codec.encode(&path);

    c.bench_function("key_encode", |b| {
        b.iter(|| black_box(codec.encode(black_box(&path))));
    });
    c.bench_function("key_decode", |b| {
        b.iter(|| black_box(codec.decode(black_box(&key)).unwrap()));
    });
}

criterion_group!(benches, bench_canonical, bench_flatten, bench_keys);

criterion_main!(benches);
