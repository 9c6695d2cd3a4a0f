//! Error types and handling for the chunked storage, disk cache, and view subsystems.
//!
//! A single taxonomy for all three subsystems, matching spec section 7 — no
//! per-component error type, since the observable failure kinds (out-of-range
//! index, capacity overflow, invalid configuration, ...) are shared across
//! Chunked Storage, the disk caches, and the View.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// An index, or an `(offset, count)` pair, fell outside the valid domain.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A mutation would have made a collection's length exceed `MAX_COUNT`.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Null-but-required input, mismatched parallel arrays, a zero-length key,
    /// an oversized key/value, or an invalid bounding box.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `get(key)` was called on a missing key (the `try_get` form returns
    /// `None` instead of this error).
    #[error("not found: {0}")]
    NotFound(String),

    /// A mutation was attempted on a read-only cache, or an operation is not
    /// supported by a stream view (e.g. `Write` on a read-only stream).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// `degree_of_parallelism = 0`, `read_only` combined with
    /// `overwrite_existing`/`delete_on_close`, or a missing serializer for a
    /// non-native key/value type.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The underlying embedded SQL engine or file system failed.
    #[error("storage I/O error: {0}")]
    StorageIo(#[from] rusqlite::Error),

    /// A serializer returned an empty byte sequence, or a deserializer could
    /// not reconstruct a value from bytes the serializer itself produced.
    #[error("serializer contract violation: {0}")]
    SerializerContract(String),

    /// Wraps `std::io::Error` from file-system operations outside SQLite
    /// (shard file deletion, directory creation for a cache's base path).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::OutOfRange`] with a formatted message.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Build an [`Error::CapacityExceeded`] with a formatted message.
    pub fn capacity_exceeded(msg: impl Into<String>) -> Self {
        Self::CapacityExceeded(msg.into())
    }

    /// Build an [`Error::InvalidArgument`] with a formatted message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build an [`Error::NotFound`] with a formatted message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build an [`Error::NotSupported`] with a formatted message.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Build an [`Error::InvalidConfiguration`] with a formatted message.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Build an [`Error::SerializerContract`] with a formatted message.
    pub fn serializer_contract(msg: impl Into<String>) -> Self {
        Self::SerializerContract(msg.into())
    }

    /// True for errors a caller might reasonably retry (storage I/O only;
    /// the rest are programming errors or permanent configuration mistakes).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageIo(_) | Error::Io(_))
    }
}
