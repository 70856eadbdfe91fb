//! Criterion benchmarks for resona-core primitives
//!
//! Run with: cargo bench -p resona-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resona_core::{LinearMemory, MemoryLayout};

const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("MemoryLayout");

    group.bench_function("mono", |b| {
        b.iter(|| {
            black_box(MemoryLayout::mono(
                black_box(4096),
                black_box(2),
                black_box(2),
                black_box(128),
            ))
        });
    });

    group.bench_function("poly_16_voices", |b| {
        b.iter(|| {
            black_box(MemoryLayout::poly(
                black_box(4096),
                black_box(16),
                black_box(2048),
                black_box(0),
                black_box(2),
                black_box(128),
            ))
        });
    });

    group.finish();
}

fn bench_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("LinearMemory");

    for &block_size in BLOCK_SIZES {
        let samples: Vec<f32> = (0..block_size).map(|i| i as f32 * 0.001).collect();
        let mut scratch = vec![0.0f32; block_size];
        let mut mem = LinearMemory::new(block_size * 4 + 64);

        group.bench_with_input(
            BenchmarkId::new("write_read", block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    mem.write_samples(0, black_box(&samples));
                    mem.read_samples(0, black_box(&mut scratch));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_layout, bench_memory);
criterion_main!(benches);
