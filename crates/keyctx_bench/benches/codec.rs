//! Key codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keyctx_bench::{random_bytes, random_ints, random_text_keys};
use keyctx_core::codec::{decode, encode};
use keyctx_core::{KeyDomain, Value};
use keyctx_engine::{Engine, LookupMode, MemoryEngine, TableKind, TableSpec, TypeKind};

/// Benchmark encoding against scalar domains.
fn bench_encode_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_scalar");
    let mut engine = MemoryEngine::new();

    for kind in [TypeKind::Int8, TypeKind::Int32, TypeKind::Int64, TypeKind::Float] {
        let domain = KeyDomain::Scalar(kind);
        let value = Value::Int(42);
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                let encoded = encode(&mut engine, black_box(&domain), black_box(&value)).unwrap();
                black_box(encoded);
            });
        });
    }

    let time = KeyDomain::Scalar(TypeKind::Time);
    let seconds = Value::Float(1_700_000_000.25);
    group.bench_function("Time_from_float", |b| {
        b.iter(|| {
            let encoded = encode(&mut engine, black_box(&time), black_box(&seconds)).unwrap();
            black_box(encoded);
        });
    });

    group.finish();
}

/// Benchmark raw encoding by key size.
fn bench_encode_raw_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_raw_size");
    let mut engine = MemoryEngine::new();

    for size in [16, 256, 4096] {
        let value = Value::Bytes(random_bytes(size));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| {
                let encoded = encode(&mut engine, &KeyDomain::Untyped, black_box(value)).unwrap();
                black_box(encoded);
            });
        });
    }

    group.finish();
}

/// Benchmark decoding.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let mut engine = MemoryEngine::new();

    let int64 = KeyDomain::Scalar(TypeKind::Int64);
    let ints: Vec<Vec<u8>> = random_ints(100)
        .iter()
        .map(|value| encode(&mut engine, &int64, value).unwrap())
        .collect();
    group.bench_function("int64_100", |b| {
        b.iter(|| {
            for bytes in &ints {
                black_box(decode(&int64, black_box(bytes)).unwrap());
            }
        });
    });

    let text = KeyDomain::Scalar(TypeKind::ShortText);
    let texts: Vec<Vec<u8>> = random_text_keys(100, 24)
        .iter()
        .map(|value| encode(&mut engine, &text, value).unwrap())
        .collect();
    group.bench_function("short_text_100", |b| {
        b.iter(|| {
            for bytes in &texts {
                black_box(decode(&text, black_box(bytes)).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark nested table key resolution.
fn bench_nested_reference(c: &mut Criterion) {
    let mut engine = MemoryEngine::new();
    engine.database_create().unwrap();
    let users = engine
        .table_create(&TableSpec::new(TableKind::HashKey).name("users"))
        .unwrap();
    let keys = random_text_keys(1000, 12);
    for key in &keys {
        let bytes = encode(&mut engine, &KeyDomain::Untyped, key).unwrap();
        engine.table_lookup(users, &bytes, LookupMode::ExactOrAdd);
    }
    let domain = KeyDomain::Table {
        table: users,
        kind: TableKind::HashKey,
    };

    c.bench_function("encode_reference_1000", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(encode(&mut engine, &domain, black_box(key)).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_encode_scalar,
    bench_encode_raw_size,
    bench_decode,
    bench_nested_reference,
);

criterion_main!(benches);
