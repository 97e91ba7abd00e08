//! Throughput benchmarks for the regex inducer.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use veracity::discover::{induce, RexOptions};

fn uniform_codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("AB-{i:04}")).collect()
}

fn mixed_shapes(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 4 {
            0 => format!("user_{i}"),
            1 => format!("{i:06}"),
            2 => format!("X{i}-{:02}", i % 7),
            _ => format!("{:04}-{:02}-{:02}", 2000 + i % 30, 1 + i % 12, 1 + i % 28),
        })
        .collect()
}

fn bench_induce(c: &mut Criterion) {
    let options = RexOptions::default();

    let codes = uniform_codes(20);
    c.bench_function("induce_uniform_codes_20", |b| {
        b.iter(|| induce(black_box(&codes), &options))
    });

    let mixed = mixed_shapes(20);
    c.bench_function("induce_mixed_shapes_20", |b| {
        b.iter(|| induce(black_box(&mixed), &options))
    });

    let wide = mixed_shapes(200);
    c.bench_function("induce_mixed_shapes_200", |b| {
        b.iter(|| induce(black_box(&wide), &options))
    });
}

criterion_group!(benches, bench_induce);
criterion_main!(benches);
