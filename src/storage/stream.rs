//! Byte-stream views over a chunked byte storage (spec section 6.2).
//!
//! Spec section 1 places the stream *wrapper classes* out of scope but
//! captures their semantics as a bit-level interface. Rust already has that
//! interface — `std::io::Read`/`Write`/`Seek` — so rather than hand-roll a
//! `Read(buf, off, cnt)`/`Write(buf, off, cnt)` pair and return a
//! `NotSupported` error when the wrong operation is called on the wrong
//! stream, each wrapper only implements the traits it actually supports: a
//! read-only stream implements `Read` + `Seek` and simply has no `Write`
//! impl, so calling `.write()` on it is a compile error rather than a
//! runtime one. This is a stricter, idiomatic realization of the same
//! contract (see DESIGN.md).

use crate::storage::chunked::ChunkedStorage;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A read-only, seekable view over a chunked byte storage.
pub struct ByteReadStream<'a, const C: usize> {
    storage: &'a ChunkedStorage<u8, C>,
    position: u64,
}

impl<'a, const C: usize> ByteReadStream<'a, C> {
    /// Wrap `storage` for reading, starting at position 0.
    pub fn new(storage: &'a ChunkedStorage<u8, C>) -> Self {
        Self {
            storage,
            position: 0,
        }
    }

    /// Total readable length: `storage.len()`.
    pub fn length(&self) -> u64 {
        self.storage.len()
    }

    /// Current read position, always in `[0, length()]`.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<const C: usize> Read for ByteReadStream<'_, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length().saturating_sub(self.position);
        if remaining == 0 {
            return Ok(0);
        }
        let take = (buf.len() as u64).min(remaining) as usize;
        crate::storage::bulk::copy_to_slice(self.storage, self.position, &mut buf[..take])
            .map_err(io::Error::other)?;
        self.position += take as u64;
        Ok(take)
    }
}

impl<const C: usize> Seek for ByteReadStream<'_, C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = resolve_seek(pos, self.position, self.length())?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

/// A write-only, seekable view over a chunked byte storage. Writes overlay
/// bytes at the current position, extending the storage's logical length
/// when `position + buf.len() > length()`.
pub struct ByteWriteStream<'a, const C: usize> {
    storage: &'a mut ChunkedStorage<u8, C>,
    position: u64,
}

impl<'a, const C: usize> ByteWriteStream<'a, C> {
    /// Wrap `storage` for writing, starting at position 0.
    pub fn new(storage: &'a mut ChunkedStorage<u8, C>) -> Self {
        Self {
            storage,
            position: 0,
        }
    }

    /// Total length of the underlying storage.
    pub fn length(&self) -> u64 {
        self.storage.len()
    }

    /// Current write position.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<const C: usize> Write for ByteWriteStream<'_, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = self.position + buf.len() as u64;
        if end > self.length() {
            self.storage
                .reserve(end)
                .map_err(io::Error::other)?;
            while self.storage.len() < end {
                self.storage.push(0).map_err(io::Error::other)?;
            }
        }
        crate::storage::bulk::copy_from_slice(self.storage, self.position, buf)
            .map_err(io::Error::other)?;
        self.position = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<const C: usize> Seek for ByteWriteStream<'_, C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = resolve_seek(pos, self.position, self.length())?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

fn resolve_seek(pos: SeekFrom, current: u64, length: u64) -> io::Result<u64> {
    let target: i128 = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::End(offset) => length as i128 + offset as i128,
        SeekFrom::Current(offset) => current as i128 + offset as i128,
    };
    if target < 0 || target as u128 > length as u128 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek position out of range",
        ));
    }
    Ok(target as u64)
}
