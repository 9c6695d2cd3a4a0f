//! Construction-time configuration for a disk cache shard or sharded cache
//! (spec section 4.3's options table).

use crate::constants::MAX_SHARDS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options controlling how a `ShardedDiskCache`/`SpatialShardedCache` opens
/// its shard files and behaves once open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Base path prefix `P` shard files are derived from: shard `i` is named
    /// `{P}_{i}.{extension}`, siblings of `P` rather than files inside it
    /// (spec section 4.4 and 6.1 — this naming is part of the cache's
    /// on-disk identity).
    pub(crate) base_path: PathBuf,
    /// Extension `E` appended to each shard file name.
    pub(crate) extension: String,
    /// Number of shards (and therefore worker threads for parallel fan-out).
    pub(crate) degree_of_parallelism: u16,
    /// Soft cap on SQLite's page cache per shard, divided evenly among shards.
    pub(crate) max_memory_size_mb: u64,
    /// If a shard file already exists: truncate and recreate it instead of
    /// opening the existing contents.
    pub(crate) overwrite_existing: bool,
    /// Delete every shard file when the cache is closed.
    pub(crate) delete_on_close: bool,
    /// Reject all mutating operations; enables `PRAGMA read_uncommitted`.
    pub(crate) read_only: bool,
}

impl CacheOptions {
    /// Start building options for a cache rooted at `base_path`, defaulting
    /// to a single shard, 64 MiB of page cache, and no destructive flags.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            extension: "db".to_string(),
            degree_of_parallelism: 1,
            max_memory_size_mb: 64,
            overwrite_existing: false,
            delete_on_close: false,
            read_only: false,
        }
    }

    /// Set the extension `E` shard file names end with (default `"db"`).
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Default the shard count to the host's available parallelism, the way
    /// the teacher's `PerformanceConfig` sizes its worker pools from
    /// `num_cpus::get()`, clamped to `MAX_SHARDS`.
    pub fn auto_degree_of_parallelism(mut self) -> Self {
        self.degree_of_parallelism = (num_cpus::get() as u16).clamp(1, MAX_SHARDS);
        self
    }

    pub fn degree_of_parallelism(mut self, n: u16) -> Self {
        self.degree_of_parallelism = n;
        self
    }

    pub fn max_memory_size_mb(mut self, mb: u64) -> Self {
        self.max_memory_size_mb = mb;
        self
    }

    pub fn overwrite_existing(mut self, v: bool) -> Self {
        self.overwrite_existing = v;
        self
    }

    pub fn delete_on_close(mut self, v: bool) -> Self {
        self.delete_on_close = v;
        self
    }

    pub fn read_only(mut self, v: bool) -> Self {
        self.read_only = v;
        self
    }

    /// Reject combinations the spec calls out as invalid configuration:
    /// `degree_of_parallelism = 0`, more shards than `MAX_SHARDS`, or
    /// `read_only` paired with either `overwrite_existing` or
    /// `delete_on_close`.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.degree_of_parallelism == 0 {
            return Err(Error::invalid_configuration(
                "degree_of_parallelism must be at least 1".to_string(),
            ));
        }
        if self.degree_of_parallelism > MAX_SHARDS {
            return Err(Error::invalid_configuration(format!(
                "degree_of_parallelism {} exceeds MAX_SHARDS {MAX_SHARDS}",
                self.degree_of_parallelism
            )));
        }
        if self.read_only && self.overwrite_existing {
            return Err(Error::invalid_configuration(
                "read_only cannot be combined with overwrite_existing".to_string(),
            ));
        }
        if self.read_only && self.delete_on_close {
            return Err(Error::invalid_configuration(
                "read_only cannot be combined with delete_on_close".to_string(),
            ));
        }
        Ok(())
    }

    /// Page-cache budget for a single shard, in whole 4 KiB pages.
    pub(crate) fn cache_pages_per_shard(&self) -> i64 {
        let bytes_per_shard =
            (self.max_memory_size_mb * 1024 * 1024) / self.degree_of_parallelism.max(1) as u64;
        (bytes_per_shard / crate::constants::PAGE_SIZE as u64).max(1) as i64
    }

    /// Shard `i`'s path: `{base_path}_{i}.{extension}`, e.g. base `"./t"`,
    /// extension `"db"` → `./t_0.db` (spec section 4.4).
    pub(crate) fn shard_path(&self, shard_index: u16) -> PathBuf {
        let mut name = self
            .base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(&format!("_{shard_index}.{}", self.extension));
        match self.base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}
