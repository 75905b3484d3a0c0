//! Table façade benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use keyctx_bench::{bench_context, random_text_keys};
use keyctx_engine::{TableKind, TableSpec};

/// Benchmark adding keys by table kind.
fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_add");

    for kind in [TableKind::HashKey, TableKind::PatKey] {
        let keys = random_text_keys(1000, 16);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{kind:?}")),
            &keys,
            |b, keys| {
                b.iter_batched(
                    || {
                        let context = bench_context();
                        let table = context.create_table(&TableSpec::new(kind)).unwrap();
                        (context, table)
                    },
                    |(_context, table)| {
                        for key in keys {
                            black_box(table.add(key.clone()).unwrap());
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark lookups by key and by id.
fn bench_get(c: &mut Criterion) {
    let context = bench_context();
    let table = context
        .create_table(&TableSpec::new(TableKind::HashKey))
        .unwrap();
    let keys = random_text_keys(1000, 16);
    let ids: Vec<u32> = keys
        .iter()
        .filter_map(|key| table.add(key.clone()).unwrap())
        .map(|record| record.id)
        .collect();

    c.bench_function("table_get_by_key_1000", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(table.get(key.clone()).unwrap());
            }
        });
    });

    c.bench_function("table_get_by_id_1000", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(table.get(*id).unwrap());
            }
        });
    });

    c.bench_function("table_key_1000", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(table.key(*id).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_add, bench_get);
criterion_main!(benches);
