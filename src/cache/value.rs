//! Column-kind tag enum and the key/value codecs that bind a Rust type to a
//! SQLite column (spec section 9: "replace [dynamic type-dispatch] with a tag
//! enum over the native key/value variants...plus a custom variant carrying
//! serializer/deserializer function references").

use crate::constants::MAX_ITEM_LENGTH;
use crate::error::{Error, Result};
use rusqlite::types::Value as SqlValue;

/// Which native SQLite storage class a key or value column uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `INTEGER`
    Integer,
    /// `TEXT`
    Text,
    /// `BLOB` — also the storage class for any `Custom` codec.
    Blob,
    /// `REAL` — valid for values only (see Open Questions in DESIGN.md).
    Real,
}

impl ColumnKind {
    /// The literal SQL type name used in `CREATE TABLE`.
    pub fn sql_type_name(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Text => "TEXT",
            ColumnKind::Blob => "BLOB",
            ColumnKind::Real => "REAL",
        }
    }
}

/// Converts a Rust type `T` to and from the SQLite value stored in a column,
/// and tags which native column kind it uses. Constructed once per
/// `DiskCacheShard`/`ShardedDiskCache` and shared across shards.
pub struct Codec<T> {
    pub(crate) kind: ColumnKind,
    to_sql: Box<dyn Fn(&T) -> SqlValue + Send + Sync>,
    from_sql: Box<dyn Fn(SqlValue) -> Result<T> + Send + Sync>,
}

impl<T> Codec<T> {
    /// Build a codec from explicit conversion functions and a column kind.
    pub fn new(
        kind: ColumnKind,
        to_sql: impl Fn(&T) -> SqlValue + Send + Sync + 'static,
        from_sql: impl Fn(SqlValue) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            to_sql: Box::new(to_sql),
            from_sql: Box::new(from_sql),
        }
    }

    /// A codec for an arbitrary type `T` not in the native {integer, text,
    /// blob, real} set: `serialize` must return a non-empty byte sequence no
    /// longer than `MAX_ITEM_LENGTH`; `deserialize` must be total on every
    /// output `serialize` can produce (spec section 6.2's serializer
    /// contract). Always stored as `BLOB`.
    pub fn custom(
        serialize: impl Fn(&T) -> Vec<u8> + Send + Sync + 'static,
        deserialize: impl Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            ColumnKind::Blob,
            move |v: &T| SqlValue::Blob(serialize(v)),
            move |v: SqlValue| match v {
                SqlValue::Blob(bytes) => {
                    if bytes.is_empty() {
                        return Err(Error::serializer_contract(
                            "serializer produced an empty byte sequence".to_string(),
                        ));
                    }
                    if bytes.len() as u64 > MAX_ITEM_LENGTH {
                        return Err(Error::invalid_argument(format!(
                            "serialized length {} exceeds MAX_ITEM_LENGTH {MAX_ITEM_LENGTH}",
                            bytes.len()
                        )));
                    }
                    deserialize(&bytes)
                }
                other => Err(Error::serializer_contract(format!(
                    "expected a BLOB column value, got {other:?}"
                ))),
            },
        )
    }

    pub(crate) fn encode(&self, value: &T) -> SqlValue {
        (self.to_sql)(value)
    }

    pub(crate) fn decode(&self, value: SqlValue) -> Result<T> {
        (self.from_sql)(value)
    }
}

impl Codec<i64> {
    /// Native `INTEGER` codec for `i64` keys/values.
    pub fn integer() -> Self {
        Self::new(
            ColumnKind::Integer,
            |v: &i64| SqlValue::Integer(*v),
            |v: SqlValue| match v {
                SqlValue::Integer(i) => Ok(i),
                other => Err(Error::serializer_contract(format!(
                    "expected an INTEGER column value, got {other:?}"
                ))),
            },
        )
    }
}

impl Codec<String> {
    /// Native `TEXT` codec for `String` keys/values. Keys must be non-empty
    /// (spec section 4.3's "string keys must be non-empty").
    pub fn text() -> Self {
        Self::new(
            ColumnKind::Text,
            |v: &String| SqlValue::Text(v.clone()),
            |v: SqlValue| match v {
                SqlValue::Text(s) => Ok(s),
                other => Err(Error::serializer_contract(format!(
                    "expected a TEXT column value, got {other:?}"
                ))),
            },
        )
    }
}

impl Codec<Vec<u8>> {
    /// Native `BLOB` codec for `Vec<u8>` keys/values.
    pub fn blob() -> Self {
        Self::new(
            ColumnKind::Blob,
            |v: &Vec<u8>| SqlValue::Blob(v.clone()),
            |v: SqlValue| match v {
                SqlValue::Blob(b) => Ok(b),
                other => Err(Error::serializer_contract(format!(
                    "expected a BLOB column value, got {other:?}"
                ))),
            },
        )
    }
}

impl Codec<f64> {
    /// Native `REAL` codec — values only. Constructing a `DiskCacheShard`
    /// with this as a *key* codec fails with `InvalidConfiguration`: the
    /// asymmetry (real values allowed, real keys not) is intentional, see
    /// DESIGN.md's Open Questions.
    pub fn real() -> Self {
        Self::new(
            ColumnKind::Real,
            |v: &f64| SqlValue::Real(*v),
            |v: SqlValue| match v {
                SqlValue::Real(r) => Ok(r),
                SqlValue::Integer(i) => Ok(i as f64),
                other => Err(Error::serializer_contract(format!(
                    "expected a REAL column value, got {other:?}"
                ))),
            },
        )
    }
}

/// Validate a key's serialized length against spec 4.3's bit-level
/// constraints: blobs/text in `[1, MAX_ITEM_LENGTH]` bytes, integers
/// unconstrained.
pub(crate) fn validate_key_value(kind: ColumnKind, value: &SqlValue) -> Result<()> {
    match (kind, value) {
        (ColumnKind::Integer, SqlValue::Integer(_)) => Ok(()),
        (ColumnKind::Text, SqlValue::Text(s)) => {
            if s.is_empty() {
                Err(Error::invalid_argument("string keys must be non-empty".to_string()))
            } else if s.len() as u64 > MAX_ITEM_LENGTH {
                Err(Error::invalid_argument(format!(
                    "key length {} exceeds MAX_ITEM_LENGTH {MAX_ITEM_LENGTH}",
                    s.len()
                )))
            } else {
                Ok(())
            }
        }
        (ColumnKind::Blob, SqlValue::Blob(b)) => {
            if b.is_empty() {
                Err(Error::invalid_argument("blob keys must be non-empty".to_string()))
            } else if b.len() as u64 > MAX_ITEM_LENGTH {
                Err(Error::invalid_argument(format!(
                    "key length {} exceeds MAX_ITEM_LENGTH {MAX_ITEM_LENGTH}",
                    b.len()
                )))
            } else {
                Ok(())
            }
        }
        (ColumnKind::Real, _) => Err(Error::invalid_configuration(
            "floating-point keys are not supported".to_string(),
        )),
        _ => Err(Error::invalid_argument(
            "key codec kind does not match the encoded SQL value".to_string(),
        )),
    }
}

/// Fold a key's SQL-encoded bytes into the single byte the shard hash uses
/// (spec section 4.4): integer keys fold their 8 little-endian bytes; string
/// keys treat each UTF-16 code unit as two bytes (low byte, then high byte);
/// blob keys (and any `Custom` key, which is always stored as a blob) fold
/// their raw bytes directly.
pub(crate) fn shard_hash_bytes(kind: ColumnKind, value: &SqlValue) -> Vec<u8> {
    match (kind, value) {
        (ColumnKind::Integer, SqlValue::Integer(i)) => i.to_le_bytes().to_vec(),
        (ColumnKind::Text, SqlValue::Text(s)) => {
            let mut bytes = Vec::with_capacity(s.len() * 2);
            for unit in s.encode_utf16() {
                let [lo, hi] = unit.to_le_bytes();
                bytes.push(lo);
                bytes.push(hi);
            }
            bytes
        }
        (ColumnKind::Blob, SqlValue::Blob(b)) => b.clone(),
        _ => Vec::new(),
    }
}

/// Compute the shard index for a key's hash bytes under `n` shards (spec
/// section 4.4's "parallel index"). Not cryptographically strong — a cheap,
/// deterministic partition that is part of the cache's on-disk identity.
pub(crate) fn shard_index(kind: ColumnKind, value: &SqlValue, n: u16) -> usize {
    if n <= 1 {
        return 0;
    }
    let bytes = shard_hash_bytes(kind, value);
    let mut b: u8 = bytes.iter().fold(0u8, |acc, x| acc ^ x);
    if n <= 16 {
        b = (b & 0x0F) ^ (b >> 4);
    }
    (b as usize) % (n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_codec_roundtrips() {
        let c = Codec::<i64>::integer();
        let encoded = c.encode(&42);
        assert_eq!(c.decode(encoded).unwrap(), 42);
    }

    #[test]
    fn custom_codec_rejects_empty_serialization() {
        let c: Codec<u32> = Codec::custom(|_v| Vec::new(), |_b| Ok(0));
        let encoded = c.encode(&7);
        assert!(c.decode(encoded).is_err());
    }

    #[test]
    fn shard_index_n_equals_one_is_always_zero() {
        let v = SqlValue::Integer(123456);
        assert_eq!(shard_index(ColumnKind::Integer, &v, 1), 0);
    }

    #[test]
    fn shard_index_is_deterministic() {
        let v = SqlValue::Text("hello".to_string());
        let a = shard_index(ColumnKind::Text, &v, 4);
        let b = shard_index(ColumnKind::Text, &v, 4);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn shard_index_in_range_for_n17() {
        for i in 0..500i64 {
            let v = SqlValue::Integer(i);
            let s = shard_index(ColumnKind::Integer, &v, 17);
            assert!(s < 17);
        }
    }
}
