//! massive-collections: chunked storage for sequences up to 2^60 elements,
//! a sharded disk-backed key/value cache (with an optional spatial index),
//! and an observable filtered/sorted view over an in-memory sequence.
#![warn(missing_docs)]

pub mod cache;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod view;

pub use error::{Error, Result};

/// Crate version, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name, as set in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
