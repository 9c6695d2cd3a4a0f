//! A parallel disk-backed key/value cache split across N independent
//! shards, each its own SQLite file (spec section 4.4, "Sharded Disk Cache").

use crate::cache::options::CacheOptions;
use crate::cache::shard::DiskCacheShard;
use crate::cache::value::{self, Codec};
use crate::error::Result;
use std::sync::Arc;

/// N `DiskCacheShard`s, with keys routed to a shard by
/// [`value::shard_index`]. Multi-shard operations (`parallel_scan`,
/// `set_many`, `remove_many`) fan out across `std::thread::scope` so each
/// shard's own mutex is only ever touched by one thread at a time.
pub struct ShardedDiskCache<K, V> {
    shards: Vec<DiskCacheShard<K, V>>,
    key_codec: Arc<Codec<K>>,
}

impl<K, V> ShardedDiskCache<K, V>
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Open (or create) `options.degree_of_parallelism` shard files under
    /// `options.base_path`.
    pub fn open(key_codec: Codec<K>, value_codec: Codec<V>, options: CacheOptions) -> Result<Self> {
        options.validate()?;
        let key_codec = Arc::new(key_codec);
        let value_codec = Arc::new(value_codec);
        let n = options.degree_of_parallelism;
        let mut shards = Vec::with_capacity(n as usize);
        for i in 0..n {
            shards.push(DiskCacheShard::open(
                options.shard_path(i),
                Arc::clone(&key_codec),
                Arc::clone(&value_codec),
                &options,
            )?);
        }
        Ok(Self { shards, key_codec })
    }

    /// Number of shards.
    pub fn shard_count(&self) -> u16 {
        self.shards.len() as u16
    }

    fn shard_for(&self, key: &K) -> Result<&DiskCacheShard<K, V>> {
        let encoded = self.key_codec.encode(key);
        value::validate_key_value(self.key_codec.kind, &encoded)?;
        let idx = value::shard_index(self.key_codec.kind, &encoded, self.shard_count());
        Ok(&self.shards[idx])
    }

    /// Insert or overwrite the value stored for `key`.
    pub fn set(&self, key: &K, val: &V) -> Result<()> {
        self.shard_for(key)?.set(key, val)
    }

    /// Fetch the value stored for `key`, failing with `NotFound` if absent.
    pub fn get(&self, key: &K) -> Result<V> {
        self.shard_for(key)?.get(key)
    }

    /// Fetch the value stored for `key`, or `None` if absent.
    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        self.shard_for(key)?.try_get(key)
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &K) -> Result<bool> {
        self.shard_for(key)?.contains(key)
    }

    /// Delete `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> Result<bool> {
        self.shard_for(key)?.remove(key)
    }

    /// Delete `key`, returning the value that was removed, if any.
    pub fn remove_return(&self, key: &K) -> Result<Option<V>> {
        self.shard_for(key)?.remove_return(key)
    }

    /// Sum of every shard's count. Not a consistent snapshot across shards:
    /// a concurrent writer can change one shard's count between this
    /// function reading it and the next (spec section 4.4's contract is
    /// explicitly best-effort, matching `DiskCacheShard::count`).
    pub fn count(&self) -> Result<u64> {
        let mut total = 0u64;
        for s in &self.shards {
            total += s.count()?;
        }
        Ok(total)
    }

    /// Remove every entry from every shard.
    pub fn clear(&self) -> Result<()> {
        for s in &self.shards {
            s.clear()?;
        }
        Ok(())
    }

    /// Insert every `(key, value)` pair, with one worker thread per shard
    /// that has at least one entry routed to it.
    pub fn set_many(&self, items: &[(K, V)]) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        let mut per_shard: Vec<Vec<(K, V)>> = (0..self.shards.len()).map(|_| Vec::new()).collect();
        for (k, v) in items {
            let encoded = self.key_codec.encode(k);
            value::validate_key_value(self.key_codec.kind, &encoded)?;
            let idx = value::shard_index(self.key_codec.kind, &encoded, self.shard_count());
            per_shard[idx].push((k.clone(), v.clone()));
        }
        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for (shard, bucket) in self.shards.iter().zip(per_shard.iter()) {
                handles.push(scope.spawn(move || -> Result<()> {
                    for (k, v) in bucket {
                        shard.set(k, v)?;
                    }
                    Ok(())
                }));
            }
            for h in handles {
                h.join().expect("shard worker thread panicked")?;
            }
            Ok(())
        })
    }

    /// Remove every key in `keys`, with one worker thread per shard that has
    /// at least one key routed to it.
    pub fn remove_many(&self, keys: &[K]) -> Result<()>
    where
        K: Clone,
    {
        let mut per_shard: Vec<Vec<K>> = (0..self.shards.len()).map(|_| Vec::new()).collect();
        for k in keys {
            let encoded = self.key_codec.encode(k);
            value::validate_key_value(self.key_codec.kind, &encoded)?;
            let idx = value::shard_index(self.key_codec.kind, &encoded, self.shard_count());
            per_shard[idx].push(k.clone());
        }
        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for (shard, bucket) in self.shards.iter().zip(per_shard.iter()) {
                handles.push(scope.spawn(move || -> Result<()> {
                    for k in bucket {
                        shard.remove(k)?;
                    }
                    Ok(())
                }));
            }
            for h in handles {
                h.join().expect("shard worker thread panicked")?;
            }
            Ok(())
        })
    }

    /// A single-use iterator over one shard's contents; call once per shard
    /// index in `0..shard_count()` to walk the whole cache without holding
    /// every shard's lock at once.
    pub fn scan(&self, shard: u16) -> Result<crate::cache::shard::ScanIter<'_, K, V>>
    where
        K: Clone,
    {
        self.shards[shard as usize].scan()
    }

    /// Scan every shard concurrently, one worker thread per shard, applying
    /// `visit` to each `(key, value)` pair; `visit` must be safe to call from
    /// multiple threads concurrently, once per shard.
    pub fn parallel_scan<F>(&self, visit: F) -> Result<()>
    where
        K: Clone,
        F: Fn(&K, &V) + Send + Sync,
    {
        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for shard in &self.shards {
                let visit = &visit;
                handles.push(scope.spawn(move || -> Result<()> {
                    for row in shard.scan()? {
                        let (k, v) = row?;
                        visit(&k, &v);
                    }
                    Ok(())
                }));
            }
            for h in handles {
                h.join().expect("shard worker thread panicked")?;
            }
            Ok(())
        })
    }

    /// Commit and close every shard, consuming the cache.
    pub fn close(self) -> Result<()> {
        for s in self.shards {
            s.close()?;
        }
        Ok(())
    }
}
