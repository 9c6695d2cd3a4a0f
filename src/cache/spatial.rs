//! A disk cache shard augmented with a 2-D spatial index (spec section 4.5,
//! "Spatial Disk Cache").
//!
//! Keys are always `i64`: SQLite's R-tree module requires its `id` column to
//! be a 64-bit integer rowid, so a spatial cache's key type is fixed rather
//! than generic the way `DiskCacheShard`'s is.

use crate::cache::options::CacheOptions;
use crate::cache::shard::DiskCacheShard;
use crate::cache::value::{self, Codec, ColumnKind};
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// An axis-aligned rectangle used both to store an item's extent and to
/// query for overlapping items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self> {
        if min_x > max_x || min_y > max_y {
            return Err(Error::invalid_argument(
                "bounding box requires min_x <= max_x and min_y <= max_y".to_string(),
            ));
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Whether `self` and `other` overlap (touching edges count as overlap).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// One shard: a `DiskCacheShard<i64, V>` for the primary table, plus an
/// `items_rtree` virtual table on the same connection for spatial lookups.
pub struct SpatialDiskCacheShard<V> {
    shard: DiskCacheShard<i64, V>,
}

impl<V> SpatialDiskCacheShard<V> {
    pub fn open(
        path: impl Into<PathBuf>,
        value_codec: Arc<Codec<V>>,
        options: &CacheOptions,
    ) -> Result<Self> {
        let shard = DiskCacheShard::open(path, Arc::new(Codec::<i64>::integer()), value_codec, options)?;
        if !options.read_only {
            shard.with_connection(|conn| {
                conn.execute_batch(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS items_rtree \
                     USING rtree(id, min_x, max_x, min_y, max_y);",
                )?;
                Ok(())
            })?;
        }
        Ok(Self { shard })
    }

    /// Insert or overwrite `key`'s value and bounding box.
    pub fn set(&self, key: i64, val: &V, bbox: BoundingBox) -> Result<()> {
        self.shard.set(&key, val)?;
        self.shard.with_connection(|conn| {
            conn.prepare_cached(
                "INSERT OR REPLACE INTO items_rtree (id, min_x, max_x, min_y, max_y) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(rusqlite::params![key, bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y])?;
            Ok(())
        })
    }

    pub fn get(&self, key: i64) -> Result<V> {
        self.shard.get(&key)
    }

    pub fn try_get(&self, key: i64) -> Result<Option<V>> {
        self.shard.try_get(&key)
    }

    /// Delete `key`'s value and spatial entry, returning whether it was
    /// present.
    pub fn remove(&self, key: i64) -> Result<bool> {
        let removed = self.shard.remove(&key)?;
        self.shard.with_connection(|conn| {
            conn.execute("DELETE FROM items_rtree WHERE id = ?1", rusqlite::params![key])?;
            Ok(())
        })?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<u64> {
        self.shard.count()
    }

    /// All `(key, value)` pairs whose stored bounding box intersects `query`.
    /// The intersection test runs inside the R-tree virtual table, not in
    /// Rust (spec section 4.5's engine-side option).
    pub fn query(&self, query: BoundingBox) -> Result<Vec<(i64, V)>>
    where
        V: Clone,
    {
        self.shard.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT items.id, items.item FROM items_rtree \
                 JOIN items ON items.id = items_rtree.id \
                 WHERE items_rtree.min_x <= ?1 AND items_rtree.max_x >= ?2 \
                   AND items_rtree.min_y <= ?3 AND items_rtree.max_y >= ?4",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![query.max_x, query.min_x, query.max_y, query.min_y],
                |row| {
                    let id: i64 = row.get(0)?;
                    let raw: rusqlite::types::Value = row.get(1)?;
                    Ok((id, raw))
                },
            )?;
            let mut out = Vec::new();
            for row in rows {
                let (id, raw) = row?;
                out.push((id, self.value_codec().decode(raw)?));
            }
            Ok(out)
        })
    }

    fn value_codec(&self) -> &Codec<V> {
        self.shard.value_codec()
    }

    pub fn close(self) -> Result<()> {
        self.shard.close()
    }
}

/// N `SpatialDiskCacheShard`s, routed the same way `ShardedDiskCache` routes
/// integer keys.
pub struct SpatialShardedCache<V> {
    shards: Vec<SpatialDiskCacheShard<V>>,
}

impl<V> SpatialShardedCache<V>
where
    V: Send + Sync,
{
    pub fn open(value_codec: Codec<V>, options: CacheOptions) -> Result<Self> {
        options.validate()?;
        let value_codec = Arc::new(value_codec);
        let n = options.degree_of_parallelism;
        let mut shards = Vec::with_capacity(n as usize);
        for i in 0..n {
            shards.push(SpatialDiskCacheShard::open(
                options.shard_path(i),
                Arc::clone(&value_codec),
                &options,
            )?);
        }
        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> u16 {
        self.shards.len() as u16
    }

    fn shard_for(&self, key: i64) -> &SpatialDiskCacheShard<V> {
        let sql = rusqlite::types::Value::Integer(key);
        let idx = value::shard_index(ColumnKind::Integer, &sql, self.shard_count());
        &self.shards[idx]
    }

    pub fn set(&self, key: i64, val: &V, bbox: BoundingBox) -> Result<()> {
        self.shard_for(key).set(key, val, bbox)
    }

    pub fn get(&self, key: i64) -> Result<V> {
        self.shard_for(key).get(key)
    }

    pub fn remove(&self, key: i64) -> Result<bool> {
        self.shard_for(key).remove(key)
    }

    pub fn count(&self) -> Result<u64> {
        let mut total = 0u64;
        for s in &self.shards {
            total += s.count()?;
        }
        Ok(total)
    }

    /// Query every shard sequentially and concatenate the results.
    pub fn query(&self, bbox: BoundingBox) -> Result<Vec<(i64, V)>>
    where
        V: Clone,
    {
        let mut out = Vec::new();
        for s in &self.shards {
            out.extend(s.query(bbox)?);
        }
        Ok(out)
    }

    /// Query every shard concurrently, one worker thread per shard, and
    /// concatenate the results once every shard finishes (spec section 5's
    /// "workers execute in parallel on independent shard locks").
    pub fn query_parallel(&self, bbox: BoundingBox) -> Result<Vec<(i64, V)>>
    where
        V: Clone + Send,
    {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .shards
                .iter()
                .map(|s| scope.spawn(move || s.query(bbox)))
                .collect();
            let mut out = Vec::new();
            for h in handles {
                out.extend(h.join().expect("shard worker thread panicked")?);
            }
            Ok(out)
        })
    }

    pub fn close(self) -> Result<()> {
        for s in self.shards {
            s.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(dir: &tempfile::TempDir, shards: u16) -> SpatialShardedCache<String> {
        let opts = CacheOptions::new(dir.path().join("shard")).degree_of_parallelism(shards);
        SpatialShardedCache::open(Codec::<String>::text(), opts).unwrap()
    }

    #[test]
    fn bounding_box_rejects_inverted_extents() {
        assert!(BoundingBox::new(5.0, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn query_returns_only_intersecting_items() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(&dir, 2);
        c.set(1, &"near-origin".to_string(), BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap())
            .unwrap();
        c.set(2, &"far-away".to_string(), BoundingBox::new(100.0, 101.0, 100.0, 101.0).unwrap())
            .unwrap();
        let found = c.query(BoundingBox::new(-1.0, 2.0, -1.0, 2.0).unwrap()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 1);
    }

    #[test]
    fn remove_drops_both_primary_and_spatial_rows() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(&dir, 1);
        c.set(1, &"a".to_string(), BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap())
            .unwrap();
        assert!(c.remove(1).unwrap());
        assert_eq!(c.count().unwrap(), 0);
        let found = c.query(BoundingBox::new(-10.0, 10.0, -10.0, 10.0).unwrap()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn query_parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(&dir, 3);
        for i in 0..20i64 {
            c.set(
                i,
                &format!("v{i}"),
                BoundingBox::new(i as f64, i as f64 + 1.0, 0.0, 1.0).unwrap(),
            )
            .unwrap();
        }
        let mut seq = c.query(BoundingBox::new(0.0, 20.0, 0.0, 1.0).unwrap()).unwrap();
        let mut par = c.query_parallel(BoundingBox::new(0.0, 20.0, 0.0, 1.0).unwrap()).unwrap();
        seq.sort_by_key(|(k, _)| *k);
        par.sort_by_key(|(k, _)| *k);
        assert_eq!(seq, par);
    }
}
