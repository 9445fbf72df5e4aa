//! Benchmarks for policy evaluation.
//!
//! Measures how quickly a loaded policy snapshot can decide one query
//! name, including the ancestor walk for subdomain matches.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use sinkhole::filter::{Classifier, FilterToggles, PolicyEngine, PolicySnapshot};

/// Synthetic blocklist text with `n` generated hosts plus a few fixed
/// names the benchmarks probe for.
fn build_blocklist(n: usize) -> String {
    let mut rng = rand::rng();
    let mut text = String::with_capacity(n * 32);
    for _ in 0..n {
        let id: u32 = rng.random_range(0..10_000_000);
        text.push_str(&format!("host-{id}.ads-network.example\n"));
    }
    text.push_str("doubleclick.net\n");
    text.push_str("tracker.example.com\n");
    text
}

fn build_engine() -> PolicyEngine {
    let blocklist = build_blocklist(10_000);
    let whitelist = "safe.tracker.example.com\n";
    let snapshot = PolicySnapshot::build(
        &blocklist,
        whitelist,
        FilterToggles::default(),
        &Classifier::defaults(),
    );
    let engine = PolicyEngine::new();
    engine.install(snapshot);
    engine
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = build_engine();

    let mut group = c.benchmark_group("policy");

    // Benchmark exact match (blocked domain)
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("evaluate", "exact_match"), |b| {
        b.iter(|| engine.evaluate(black_box("doubleclick.net")))
    });

    // Benchmark subdomain match (blocked via parent)
    group.bench_function(BenchmarkId::new("evaluate", "subdomain_match"), |b| {
        b.iter(|| engine.evaluate(black_box("stats.g.doubleclick.net")))
    });

    // Benchmark whitelist hit (overrides a blocked parent)
    group.bench_function(BenchmarkId::new("evaluate", "whitelist_priority"), |b| {
        b.iter(|| engine.evaluate(black_box("safe.tracker.example.com")))
    });

    // Benchmark miss (not blocked)
    group.bench_function(BenchmarkId::new("evaluate", "miss"), |b| {
        b.iter(|| engine.evaluate(black_box("www.wikipedia.org")))
    });

    // Benchmark deep subdomain miss
    group.bench_function(BenchmarkId::new("evaluate", "deep_miss"), |b| {
        b.iter(|| engine.evaluate(black_box("a.b.c.d.e.f.example.org")))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_evaluate(&mut criterion);
    criterion.final_summary();
}
