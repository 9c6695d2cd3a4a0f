//! Prometheus metrics (spec section A.5 in SPEC_FULL.md): additive
//! observability, not excluded by any of spec.md's Non-goals.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

/// Process-wide metrics registry. Callers embedding this crate into a larger
/// service can merge this into their own registry via `Registry::gather`.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Disk cache shard hit/miss counters, labeled by outcome (`hit`/`miss`).
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "massive_collections_cache_lookups_total",
            "Disk cache shard lookups, labeled by outcome",
        ),
        &["outcome"],
    )
    .expect("metric options are well-formed");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric not already registered");
    counter
});

/// Number of disk cache shards currently open across this process.
pub static OPEN_SHARDS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "massive_collections_open_shards",
        "Disk cache shards currently open",
    )
    .expect("metric options are well-formed");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric not already registered");
    gauge
});

/// Latency of a Filtered/Sorted View rebuild, in seconds.
pub static VIEW_REBUILD_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(HistogramOpts::new(
        "massive_collections_view_rebuild_seconds",
        "Time spent rebuilding a View's index map",
    ))
    .expect("metric options are well-formed");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric not already registered");
    histogram
});

pub fn record_cache_hit() {
    CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
}
