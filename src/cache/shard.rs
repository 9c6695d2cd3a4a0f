//! A single disk cache shard: one SQLite file holding one key/value table
//! (spec section 4.3, "Disk Cache Shard").

use crate::cache::options::CacheOptions;
use crate::cache::value::{self, Codec, ColumnKind};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Open (or create) the SQLite file at `path` with the pragmas every shard in
/// this crate uses: a fixed page size, a page-cache budget, no rollback
/// journal, and no fsync — the cache only promises durability up to
/// `close()`/`Drop`, never crash durability (spec's Non-goals), so paying for
/// journaling would buy nothing.
pub(crate) fn open_shard_connection(
    path: &Path,
    cache_pages: i64,
    overwrite_existing: bool,
    read_only: bool,
) -> Result<Connection> {
    if overwrite_existing && path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = if read_only {
        Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?
    } else {
        Connection::open(path)?
    };
    conn.pragma_update(None, "page_size", crate::constants::PAGE_SIZE)?;
    conn.pragma_update(None, "cache_size", cache_pages)?;
    conn.pragma_update(None, "journal_mode", "OFF")?;
    conn.pragma_update(None, "synchronous", "OFF")?;
    if read_only {
        conn.pragma_update(None, "read_uncommitted", true)?;
    }
    Ok(conn)
}

/// One key/value SQLite table, with an exclusive lock held around every
/// operation and a single open transaction spanning the shard's whole
/// lifetime (begun at construction, committed at `close()`), so per-call
/// commits never hit disk.
pub struct DiskCacheShard<K, V> {
    conn: Mutex<Connection>,
    path: PathBuf,
    key_codec: Arc<Codec<K>>,
    value_codec: Arc<Codec<V>>,
    read_only: bool,
    delete_on_close: bool,
    closed: AtomicBool,
}

impl<K, V> DiskCacheShard<K, V> {
    /// Open a shard database at `path`, creating the `items` table if absent.
    pub fn open(
        path: impl Into<PathBuf>,
        key_codec: Arc<Codec<K>>,
        value_codec: Arc<Codec<V>>,
        options: &CacheOptions,
    ) -> Result<Self> {
        if key_codec.kind == ColumnKind::Real {
            return Err(Error::invalid_configuration(
                "floating-point keys are not supported".to_string(),
            ));
        }
        let path = path.into();
        let conn = open_shard_connection(
            &path,
            options.cache_pages_per_shard(),
            options.overwrite_existing,
            options.read_only,
        )?;
        if !options.read_only {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS items (id {} PRIMARY KEY, item {});",
                key_codec.kind.sql_type_name(),
                value_codec.kind.sql_type_name(),
            ))?;
            conn.execute_batch("BEGIN;")?;
        }
        crate::metrics::OPEN_SHARDS.inc();
        tracing::debug!(path = %path.display(), read_only = options.read_only, "opened disk cache shard");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            key_codec,
            value_codec,
            read_only: options.read_only,
            delete_on_close: options.delete_on_close,
            closed: AtomicBool::new(false),
        })
    }

    /// Path to this shard's database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against this shard's connection while holding the shard's
    /// exclusive lock. Used by `SpatialDiskCacheShard` to add an R-tree
    /// table and queries against it on the same connection/transaction as
    /// the primary `items` table, so the two tables never drift into
    /// separate transactions.
    pub(crate) fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub(crate) fn value_codec(&self) -> &Codec<V> {
        &self.value_codec
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::not_supported(
                "this cache was opened read_only".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn encode_key(&self, key: &K) -> Result<SqlValue> {
        let encoded = self.key_codec.encode(key);
        value::validate_key_value(self.key_codec.kind, &encoded)?;
        Ok(encoded)
    }

    /// Insert or overwrite the value stored for `key`.
    pub fn set(&self, key: &K, val: &V) -> Result<()> {
        self.require_writable()?;
        let key_sql = self.encode_key(key)?;
        let val_sql = self.value_codec.encode(val);
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO items (id, item) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET item = excluded.item",
        )?
        .execute(rusqlite::params![key_sql, val_sql])?;
        Ok(())
    }

    /// Fetch the value stored for `key`, or `None` if absent.
    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        let key_sql = self.encode_key(key)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT item FROM items WHERE id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![key_sql])?;
        match rows.next()? {
            Some(row) => {
                crate::metrics::record_cache_hit();
                let raw: SqlValue = row.get(0)?;
                Ok(Some(self.value_codec.decode(raw)?))
            }
            None => {
                crate::metrics::record_cache_miss();
                Ok(None)
            }
        }
    }

    /// Fetch the value stored for `key`, failing with `NotFound` if absent.
    pub fn get(&self, key: &K) -> Result<V> {
        self.try_get(key)?
            .ok_or_else(|| Error::not_found("key not present in this shard".to_string()))
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &K) -> Result<bool> {
        let key_sql = self.encode_key(key)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT 1 FROM items WHERE id = ?1")?;
        Ok(stmt.exists(rusqlite::params![key_sql])?)
    }

    /// Delete `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> Result<bool> {
        self.require_writable()?;
        let key_sql = self.encode_key(key)?;
        let conn = self.conn.lock();
        let changed = conn
            .prepare_cached("DELETE FROM items WHERE id = ?1")?
            .execute(rusqlite::params![key_sql])?;
        Ok(changed > 0)
    }

    /// Delete `key`, returning the value that was removed, if any.
    pub fn remove_return(&self, key: &K) -> Result<Option<V>> {
        self.require_writable()?;
        let key_sql = self.encode_key(key)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM items WHERE id = ?1 RETURNING item")?;
        let mut rows = stmt.query(rusqlite::params![key_sql])?;
        match rows.next()? {
            Some(row) => {
                let raw: SqlValue = row.get(0)?;
                Ok(Some(self.value_codec.decode(raw)?))
            }
            None => Ok(None),
        }
    }

    /// Number of entries currently in this shard. Not a consistent snapshot
    /// against concurrent mutation from other threads sharing this shard
    /// (spec section 4.3's `count` contract is best-effort, not atomic).
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.prepare_cached("SELECT COUNT(*) FROM items")?.query_row([], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        self.require_writable()?;
        let conn = self.conn.lock();
        conn.execute("DELETE FROM items", [])?;
        Ok(())
    }

    /// A single-use, non-restartable iterator over every `(key, value)` pair
    /// currently in the shard. Holds the shard's exclusive lock for its
    /// entire lifetime — other operations on this shard block until the
    /// iterator is dropped.
    pub fn scan(&self) -> Result<ScanIter<'_, K, V>>
    where
        K: Clone,
    {
        let guard = self.conn.lock();
        let rows: Vec<(SqlValue, SqlValue)> = {
            let mut stmt = guard.prepare_cached("SELECT id, item FROM items")?;
            let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(ScanIter {
            _guard: guard,
            rows: rows.into_iter(),
            key_codec: &self.key_codec,
            value_codec: &self.value_codec,
        })
    }

    /// Commit the shard's long-running transaction (if writable) and, if
    /// `delete_on_close` was set, remove the file afterwards. Prefer this
    /// over letting the shard drop: `Drop` makes a best-effort attempt at the
    /// same cleanup but cannot report failure.
    pub fn close(self) -> Result<()> {
        self.finish()
    }

    fn finish(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        crate::metrics::OPEN_SHARDS.dec();
        if !self.read_only {
            let conn = self.conn.lock();
            conn.execute_batch("COMMIT;")?;
        }
        if self.delete_on_close && self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        tracing::debug!(path = %self.path.display(), deleted = self.delete_on_close, "closed disk cache shard");
        Ok(())
    }
}

impl<K, V> Drop for DiskCacheShard<K, V> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Iterator returned by [`DiskCacheShard::scan`].
pub struct ScanIter<'a, K, V> {
    _guard: parking_lot::MutexGuard<'a, Connection>,
    rows: std::vec::IntoIter<(SqlValue, SqlValue)>,
    key_codec: &'a Codec<K>,
    value_codec: &'a Codec<V>,
}

impl<'a, K, V> Iterator for ScanIter<'a, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (k, v) = self.rows.next()?;
        Some(
            self.key_codec
                .decode(k)
                .and_then(|k| self.value_codec.decode(v).map(|v| (k, v))),
        )
    }
}
