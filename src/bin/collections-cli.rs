//! Demo binary exercising the three subsystems from the command line.
//!
//! Not a shipped product surface — spec.md places "the CLI/packaging
//! surface" out of scope as an external collaborator. This binary is new
//! ambient tooling added so the library's three subsystems have a runnable
//! demonstration, the way the teacher's `main.rs` wires `clap` subcommands
//! to library calls.

use clap::{Parser, Subcommand};
use massive_collections::cache::{CacheOptions, Codec, ShardedDiskCache};
use massive_collections::storage::{binary_search_by, sort_by, ChunkedVec};
use massive_collections::view::{ObservableVec, View};
use tracing::info;

#[derive(Parser)]
#[command(name = "collections-cli", version, about = "massive-collections demo binary")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push, sort, and binary-search a chunked sequence of integers.
    ChunkedBench {
        /// How many elements to push before sorting.
        #[arg(long, default_value_t = 10_000)]
        count: u64,
    },
    /// Round-trip a handful of keys through a sharded disk cache.
    CacheDemo {
        /// Base path prefix: shard `i` is created as `{base_path}_{i}.db`.
        #[arg(long, default_value = "./collections-cli-cache")]
        base_path: String,
        /// Number of shards.
        #[arg(long, default_value_t = 4)]
        shards: u16,
    },
    /// Insert a few bounding boxes and run a spatial range query.
    CacheSpatialDemo {
        /// Base path prefix: shard `i` is created as `{base_path}_{i}.db`.
        #[arg(long, default_value = "./collections-cli-spatial-cache")]
        base_path: String,
        /// Number of shards.
        #[arg(long, default_value_t = 2)]
        shards: u16,
    },
    /// Build a filtered/sorted view over an in-memory observable sequence.
    ViewDemo,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::ChunkedBench { count } => chunked_bench(count)?,
        Commands::CacheDemo { base_path, shards } => cache_demo(&base_path, shards)?,
        Commands::CacheSpatialDemo { base_path, shards } => cache_spatial_demo(&base_path, shards)?,
        Commands::ViewDemo => view_demo(),
    }
    Ok(())
}

fn chunked_bench(count: u64) -> anyhow::Result<()> {
    let mut storage: ChunkedVec<u64> = ChunkedVec::new();
    let started = std::time::Instant::now();
    for v in 0..count {
        // A cheap deterministic shuffle so the sort has real work to do.
        storage.push((v.wrapping_mul(2654435761)) % count.max(1))?;
    }
    info!(count, elapsed = ?started.elapsed(), "pushed elements");

    sort_by(&mut storage, 0, storage.len(), |a, b| a.cmp(b))?;
    info!(elapsed = ?started.elapsed(), "sorted");

    let probe = count / 2;
    let found = binary_search_by(&storage, 0, storage.len(), |x| x.cmp(&probe))?;
    println!("chunked-bench: pushed {count} elements, binary_search({probe}) = {found:?}");
    Ok(())
}

fn cache_demo(base_path: &str, shards: u16) -> anyhow::Result<()> {
    let options = CacheOptions::new(base_path)
        .degree_of_parallelism(shards)
        .overwrite_existing(true)
        .delete_on_close(true);
    let cache: ShardedDiskCache<i64, String> =
        ShardedDiskCache::open(Codec::<i64>::integer(), Codec::<String>::text(), options)?;

    let items: Vec<(i64, String)> = (0..100).map(|i| (i, format!("value-{i}"))).collect();
    cache.set_many(&items)?;
    println!("cache-demo: inserted {} entries across {} shards", cache.count()?, shards);

    cache.remove(&42)?;
    println!("cache-demo: try_get(42) after remove = {:?}", cache.try_get(&42)?);

    cache.close()?;
    Ok(())
}

fn cache_spatial_demo(base_path: &str, shards: u16) -> anyhow::Result<()> {
    use massive_collections::cache::BoundingBox;
    use massive_collections::cache::SpatialShardedCache;

    let options = CacheOptions::new(base_path)
        .degree_of_parallelism(shards)
        .overwrite_existing(true)
        .delete_on_close(true);
    let cache: SpatialShardedCache<String> = SpatialShardedCache::open(Codec::<String>::text(), options)?;

    cache.set(1, &"near-origin".to_string(), BoundingBox::new(0.0, 1.0, 0.0, 1.0)?)?;
    cache.set(2, &"far-away".to_string(), BoundingBox::new(100.0, 101.0, 100.0, 101.0)?)?;

    let hits = cache.query(BoundingBox::new(-1.0, 2.0, -1.0, 2.0)?)?;
    println!("cache-spatial-demo: query matched {} item(s)", hits.len());
    for (id, value) in hits {
        println!("  id={id} value={value}");
    }

    cache.close()?;
    Ok(())
}

fn view_demo() {
    use std::sync::Arc;

    let source = Arc::new(ObservableVec::<i32>::new());
    for v in [5, 3, 1, 4, 2] {
        source.push(v).expect("push never exceeds MAX_COUNT here");
    }
    let view = View::with_predicate_and_comparator(
        Arc::clone(&source),
        Some(Box::new(|v: &i32| *v > 2)),
        Some(Box::new(|a: &i32, b: &i32| a.cmp(b))),
    );
    let items: Vec<i32> = view.iter().map(|r| r.expect("source index in range")).collect();
    println!("view-demo: filtered+sorted view = {items:?}");
}
