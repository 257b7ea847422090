//! Performance benchmarks for the Toeplitz primitives.
//!
//! Run with: `cargo bench -p bb84-crypto`
//!
//! The `mac_shape` case is the per-frame MAC workload (40-bit tags over a
//! 16 KiB basis announcement); `extract_shape` approximates a privacy
//! amplification pass.

use std::hint::black_box;

use bb84_bits::{bytes_for, BitVec};
use bb84_crypto::Toeplitz;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

fn random_bits(bits: usize) -> BitVec {
    let mut buf = vec![0u8; bytes_for(bits)];
    getrandom::fill(&mut buf).expect("os entropy");
    BitVec::new(&buf, bits)
}

fn bench_mul_mac_shape(c: &mut Criterion) {
    let (m, n) = (40, 655_360);
    let seed = random_bits(m + n - 1);
    let vec = random_bits(n);

    let mut group = c.benchmark_group("toeplitz_mul");
    group.throughput(Throughput::Bytes((n / 8) as u64));
    group.bench_function("mac_shape_40xn", |b| {
        let t = Toeplitz::new(&seed, m, n);
        b.iter(|| t.mul(black_box(&vec)).unwrap())
    });
    group.finish();
}

fn bench_mul_extract_shape(c: &mut Criterion) {
    let (m, n) = (4096, 65_536);
    let seed = random_bits(m + n - 1);
    let vec = random_bits(n);

    let mut group = c.benchmark_group("toeplitz_mul");
    group.sample_size(10);
    group.throughput(Throughput::Bytes((n / 8) as u64));
    group.bench_function("extract_shape_4096xn", |b| {
        let t = Toeplitz::new(&seed, m, n);
        b.iter(|| t.mul(black_box(&vec)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_mul_mac_shape, bench_mul_extract_shape);
criterion_main!(benches);
