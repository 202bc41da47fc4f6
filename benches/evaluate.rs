//! Evaluation benchmark suite
//!
//! - uncached pipeline for a single chart
//! - warm-cache lookup
//! - parallel batch of distinct charts

use aptitude::config::{AlgorithmConfig, CacheConfig};
use aptitude::models::{Branch, ChartInput, SolarDate, Stem};
use aptitude::services::CapabilityEngine;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

fn solar() -> SolarDate {
    SolarDate {
        year: 1988,
        month: 8,
        day: 8,
        hour: 12,
        minute: 0,
    }
}

/// Deterministic spread of charts over the sixty stem/branch pairs
fn generate_charts(count: usize) -> Vec<ChartInput> {
    (0..count)
        .map(|i| {
            let pair = |offset: usize| {
                let n = (i * 7 + offset * 13) % 60;
                (Stem::ALL[n % 10].hanzi(), Branch::ALL[n % 12].hanzi())
            };
            ChartInput::from_pillars([pair(0), pair(1), pair(2), pair(3)], "male", solar())
        })
        .collect()
}

fn engine(enabled: bool) -> CapabilityEngine {
    let cache = CacheConfig {
        enabled,
        ..CacheConfig::default()
    };
    CapabilityEngine::new(AlgorithmConfig::default(), cache).expect("engine")
}

fn bench_uncached(c: &mut Criterion) {
    let engine = engine(false);
    let chart = &generate_charts(1)[0];

    c.bench_function("evaluate_uncached", |b| {
        b.iter(|| engine.evaluate_complete(black_box(chart)))
    });
}

fn bench_warm_cache(c: &mut Criterion) {
    let engine = engine(true);
    let chart = &generate_charts(1)[0];
    engine.evaluate_complete(chart).expect("warm up");

    c.bench_function("evaluate_cached", |b| {
        b.iter(|| engine.evaluate_complete(black_box(chart)))
    });
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_batch");
    for size in [10usize, 100, 1000] {
        let charts = generate_charts(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &charts, |b, charts| {
            let engine = engine(false);
            b.iter(|| engine.evaluate_batch(black_box(charts)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_uncached, bench_warm_cache, bench_batch);
criterion_main!(benches);
