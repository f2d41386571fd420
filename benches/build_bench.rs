// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Construction throughput across text sizes.
//!
//! Run with: cargo bench --bench build_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sfxtree::builder::{Builder, BuilderOptions};
use sfxtree::storage::heap::HeapStorage;
use sfxtree::storage::StorageProvider;
use std::sync::Arc;

/// Pseudo-random but deterministic lowercase-alphabet text, so successive
/// runs are comparable.
fn random_text(len: usize, alphabet_size: u8) -> Vec<u16> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let letter = b'a' + (state % alphabet_size as u64) as u8;
            letter as u16
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &len in &[1_000usize, 10_000, 100_000] {
        let text = random_text(len, 20);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| {
                let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
                let builder = Builder::new(text.clone(), BuilderOptions::default()).unwrap();
                let out = builder.build(&storage).unwrap();
                black_box(out.leaf_count)
            });
        });
    }
    group.finish();
}

fn bench_build_highly_repetitive(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_repetitive");
    let period: Vec<u16> = "abc".encode_utf16().collect();
    for &repeats in &[1_000usize, 10_000] {
        let mut text = Vec::with_capacity(period.len() * repeats);
        for _ in 0..repeats {
            text.extend_from_slice(&period);
        }
        group.throughput(Throughput::Elements(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(repeats), &text, |b, text| {
            b.iter(|| {
                let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
                let builder = Builder::new(text.clone(), BuilderOptions::default()).unwrap();
                let out = builder.build(&storage).unwrap();
                black_box(out.node_count)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_build_highly_repetitive);
criterion_main!(benches);
