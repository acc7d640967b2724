//! Criterion benchmarks for the Controlled Prefix Expansion preprocessor.
//!
//! Run with:
//!   cargo bench --bench cpe

use criterion::{criterion_group, criterion_main, Criterion};

use lpmfwd::cpe::{expand_range, Prefix};

fn synthetic_prefixes(n: usize) -> Vec<Prefix> {
    (0..n)
        .map(|i| Prefix {
            key: (i as u32) << 16,
            length: 8 + (i % 12) as u8,
            next_hop: i as u32 + 1,
        })
        .collect()
}

fn bench_expand_to_dla_stride(c: &mut Criterion) {
    let prefixes = synthetic_prefixes(2_000);
    c.bench_function("cpe_expand_1_to_20", |b| {
        b.iter(|| expand_range(&prefixes, 1, 20, 20));
    });
}

criterion_group!(benches, bench_expand_to_dla_stride);
criterion_main!(benches);
