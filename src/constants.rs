//! Crate-wide limits shared by the chunked storage, disk cache, and view subsystems.

/// Upper bound on the logical length of any chunked collection or cache: 2^60.
///
/// Three orders of magnitude past what a signed 32-bit length permits, chosen
/// so 64-bit index arithmetic never has to reason about the top four bits.
pub const MAX_COUNT: u64 = 1 << 60;

/// Default chunk length for reference-sized element types.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// SQLite page size used by every disk cache shard, in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// Per-blob upper bound on a serialized key or value, in bytes (1 GiB).
pub const MAX_ITEM_LENGTH: u64 = 1 << 30;

/// Maximum number of shards a `ShardedDiskCache` may be opened with.
pub const MAX_SHARDS: u16 = 255;

/// Partition size below which the chunk-aware quicksort falls back to insertion sort.
pub const SORT_INSERTION_THRESHOLD: usize = 16;
