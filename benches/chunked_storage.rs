//! Chunk-aware bulk paths against naive per-element loops (spec section 4.1/4.2).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use massive_collections::storage::{copy_to, sort_by, ChunkedVec};

fn fill(n: u64) -> ChunkedVec<u64> {
    let mut s: ChunkedVec<u64> = ChunkedVec::with_capacity(n).unwrap();
    for v in 0..n {
        s.push((v.wrapping_mul(2654435761)) % n.max(1)).unwrap();
    }
    s
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");
    for &n in &[1_000u64, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut s: ChunkedVec<u64> = ChunkedVec::new();
                for v in 0..n {
                    s.push(black_box(v)).unwrap();
                }
                black_box(s.len())
            });
        });
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    for &n in &[1_000u64, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || fill(n),
                |mut s| {
                    sort_by(&mut s, 0, s.len(), |a, b| a.cmp(b)).unwrap();
                    black_box(s)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_chunk_aware_copy_vs_elementwise(c: &mut Criterion) {
    let n = 200_000u64;
    let src = fill(n);
    let mut group = c.benchmark_group("copy_to");
    group.bench_function("chunk_aware", |b| {
        b.iter_batched(
            || ChunkedVec::<u64>::with_capacity(n).unwrap(),
            |mut dst| {
                for _ in 0..n {
                    dst.push(0).unwrap();
                }
                copy_to(&src, 0, &mut dst, 0, n).unwrap();
                black_box(dst)
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.bench_function("elementwise", |b| {
        b.iter_batched(
            || ChunkedVec::<u64>::with_capacity(n).unwrap(),
            |mut dst| {
                for _ in 0..n {
                    dst.push(0).unwrap();
                }
                for i in 0..n {
                    dst.set(i, *src.get(i).unwrap()).unwrap();
                }
                black_box(dst)
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_push, bench_sort, bench_chunk_aware_copy_vs_elementwise);
criterion_main!(benches);
