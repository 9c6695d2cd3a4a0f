//! Chunked large storage (component A) and its chunk-aware bulk operators
//! (component B): a 64-bit-indexed mutable sequence backed by fixed-size
//! chunks, plus copy/sort/search/iterate paths that are aware of chunk
//! boundaries.

pub mod bulk;
pub mod chunked;
pub mod stream;

pub use bulk::{copy_from_slice, copy_to, copy_to_slice, copy_within};
pub use chunked::{
    binary_search_by, do_for_each, do_for_each_with, sort_by, ChunkedStorage, ChunkedVec,
};
pub use stream::{ByteReadStream, ByteWriteStream};
