//! A parallel disk-backed key/value cache (components C, D, E): one
//! embedded SQL database file per shard, with an optional spatial (R-tree)
//! index layered on top.

pub mod options;
pub mod shard;
pub mod sharded;
pub mod spatial;
pub mod value;

pub use options::CacheOptions;
pub use shard::{DiskCacheShard, ScanIter};
pub use sharded::ShardedDiskCache;
pub use spatial::{BoundingBox, SpatialDiskCacheShard, SpatialShardedCache};
pub use value::{Codec, ColumnKind};
