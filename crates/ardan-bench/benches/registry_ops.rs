//! Criterion micro-benchmarks for fleet-wide registry operations.

use std::hint::black_box;

use ardan_bench::{recorded_registry, update_mix};
use ardan_core::BranchIndex;
use criterion::{criterion_group, criterion_main, Criterion};

/// Benchmark: route 1000 updates into a 64-entity fleet.
fn bench_route_1000(c: &mut Criterion) {
    let mut reg = recorded_registry(64, 1);
    let updates = update_mix(1000, 64);

    c.bench_function("registry_route_1000", |b| {
        b.iter(|| {
            for env in &updates {
                black_box(reg.route(env));
            }
        });
    });
}

/// Benchmark: rewind and replay a 64-entity fleet with 1000 entries each.
fn bench_rewind_replay(c: &mut Criterion) {
    let mut reg = recorded_registry(64, 1000);

    c.bench_function("registry_rewind_replay_64x1000", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 13.7) % 1000.0;
            reg.rewind(t);
            black_box(reg.replay());
        });
    });
}

/// Benchmark: diff live state against branch 0 across the fleet.
fn bench_diff(c: &mut Criterion) {
    let reg = recorded_registry(64, 1000);

    c.bench_function("registry_diff_64x1000", |b| {
        b.iter(|| black_box(reg.diff(BranchIndex(0), black_box(500.0)).unwrap()));
    });
}

criterion_group!(benches, bench_route_1000, bench_rewind_replay, bench_diff);
criterion_main!(benches);
