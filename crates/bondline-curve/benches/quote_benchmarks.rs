//! Quote Benchmarks for Bondline
//!
//! Slice-sum quoting runs up to two price evaluations per slice; these track
//! the cost of a full 100-slice quote against the exact integral.

use bondline_core::{PRECISION, U256};
use bondline_curve::BondingCurve;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn quote_benchmarks(c: &mut Criterion) {
    let curve = BondingCurve::new(U256::exp10(15), U256::exp10(12)).unwrap();
    let supply = U256::from(10_000u64) * PRECISION;

    let mut group = c.benchmark_group("curve");

    group.bench_function("price_at", |b| {
        b.iter(|| curve.price_at(black_box(supply)))
    });

    group.bench_function("integral", |b| {
        b.iter(|| curve.integral(black_box(supply)))
    });

    group.bench_function("mint_quote_100_slices", |b| {
        b.iter(|| curve.mint_quote(black_box(supply), black_box(PRECISION * U256::from(50u64))))
    });

    group.bench_function("burn_quote_100_slices", |b| {
        b.iter(|| curve.burn_quote(black_box(supply), black_box(PRECISION * U256::from(500u64))))
    });

    group.finish();
}

criterion_group!(benches, quote_benchmarks);
criterion_main!(benches);
