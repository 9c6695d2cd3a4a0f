//! Throughput of a `ShardedDiskCache` across varying shard counts (spec
//! section 4.4's parallel fan-out).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use massive_collections::cache::{CacheOptions, Codec, ShardedDiskCache};

fn open_cache(dir: &std::path::Path, shards: u16) -> ShardedDiskCache<i64, String> {
    let options = CacheOptions::new(dir.join("shard"))
        .degree_of_parallelism(shards)
        .overwrite_existing(true);
    ShardedDiskCache::open(Codec::<i64>::integer(), Codec::<String>::text(), options).unwrap()
}

fn bench_set_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_many");
    for &shards in &[1u16, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(shards), &shards, |b, &shards| {
            b.iter_batched(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let cache = open_cache(dir.path(), shards);
                    let items: Vec<(i64, String)> = (0..2_000).map(|i| (i, format!("v{i}"))).collect();
                    (dir, cache, items)
                },
                |(dir, cache, items)| {
                    cache.set_many(&items).unwrap();
                    black_box(cache.count().unwrap());
                    drop(cache);
                    drop(dir);
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_scan");
    for &shards in &[1u16, 4, 16] {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(dir.path(), shards);
        let items: Vec<(i64, String)> = (0..5_000).map(|i| (i, format!("v{i}"))).collect();
        cache.set_many(&items).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(shards), &shards, |b, _| {
            b.iter(|| {
                let seen = std::sync::atomic::AtomicU64::new(0);
                cache
                    .parallel_scan(|_k, _v| {
                        seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    })
                    .unwrap();
                black_box(seen.load(std::sync::atomic::Ordering::Relaxed))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_set_many, bench_parallel_scan);
criterion_main!(benches);
