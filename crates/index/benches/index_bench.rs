//! Index engine benchmarks.
//!
//! Measures point lookups, batch inserts and range scans across every
//! variant behind the same contract, so the structures can be compared
//! like for like.

#![allow(clippy::expect_used, missing_docs)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use grove_index::{IndexConfig, IndexKind, InternPool, OrderedIndex, create_index};

const KINDS: [IndexKind; 4] =
    [IndexKind::Avl, IndexKind::RedBlack, IndexKind::BTree, IndexKind::Flat];

// =============================================================================
// Helpers
// =============================================================================

/// Populate an index with `count` sequential key-value pairs.
fn populate(index: &mut dyn OrderedIndex<u64>, count: usize) {
    for i in 0..count {
        index.insert(&format!("key-{i:08}"), i as u64).expect("insert");
    }
}

fn fresh(kind: IndexKind) -> Box<dyn OrderedIndex<u64>> {
    let pool = Arc::new(InternPool::new());
    create_index(kind, &IndexConfig::default(), &pool)
}

// =============================================================================
// Point Lookups
// =============================================================================

/// Benchmark point lookups against a 10k-entry index of each kind.
fn bench_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/point_lookup");
    group.throughput(Throughput::Elements(1));

    for kind in KINDS {
        let mut index = fresh(kind);
        populate(index.as_mut(), 10_000);

        group.bench_with_input(BenchmarkId::new("10k", kind.as_str()), &kind, |b, _| {
            let mut counter = 0usize;
            b.iter(|| {
                counter = (counter + 1) % 10_000;
                let key = format!("key-{counter:08}");
                black_box(index.get(&key).expect("present"))
            });
        });
    }
    group.finish();
}

// =============================================================================
// Inserts
// =============================================================================

/// Benchmark building a 1k-entry index from scratch.
fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/batch_insert");
    group.throughput(Throughput::Elements(1_000));

    for kind in KINDS {
        group.bench_with_input(BenchmarkId::new("1k", kind.as_str()), &kind, |b, &kind| {
            b.iter_batched(
                || fresh(kind),
                |mut index| {
                    populate(index.as_mut(), 1_000);
                    index
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// =============================================================================
// Range Scans
// =============================================================================

/// Benchmark scanning 1k keys out of a 10k-entry ordered index.
fn bench_range_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/range_scan");
    group.throughput(Throughput::Elements(1_000));

    for kind in [IndexKind::Avl, IndexKind::RedBlack, IndexKind::BTree] {
        let mut index = fresh(kind);
        populate(index.as_mut(), 10_000);
        let min = format!("key-{:08}", 4_500);
        let max = format!("key-{:08}", 5_499);

        group.bench_with_input(BenchmarkId::new("1k_of_10k", kind.as_str()), &kind, |b, _| {
            b.iter(|| black_box(index.range(&min, &max)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_point_lookup, bench_batch_insert, bench_range_scan);
criterion_main!(benches);
