//! Chunk-aware bulk copy paths (spec section 4.2).
//!
//! Each function walks the source and destination chunk-by-chunk, doing a
//! contiguous `clone_from_slice` within each chunk instead of calling
//! `get`/`set` per element, which is the whole point of a chunk-aware fast
//! path: index arithmetic (`i / CHUNK`, `i % CHUNK`) is computed once per
//! chunk instead of once per element.

use crate::error::{Error, Result};
use crate::storage::chunked::ChunkedStorage;

/// Copy `count` elements from `src[src_off..]` into `dst[dst_off..]`.
///
/// Distinct storages never alias in safe Rust (the borrow checker already
/// forbids holding `&src` and `&mut dst` to the same value), so this never
/// needs memmove semantics — only [`copy_within`] on a single storage does.
pub fn copy_to<T, const C1: usize, const C2: usize>(
    src: &ChunkedStorage<T, C1>,
    src_off: u64,
    dst: &mut ChunkedStorage<T, C2>,
    dst_off: u64,
    count: u64,
) -> Result<()>
where
    T: Clone + Default,
{
    src.check_range_pub(src_off, count)?;
    dst.check_range_pub(dst_off, count)?;
    if count == 0 {
        return Ok(());
    }
    // Chunk-aware walk bounded by the smaller of the two chunk widths so each
    // inner loop stays within a single source chunk *and* a single
    // destination chunk.
    let mut remaining = count;
    let mut s = src_off;
    let mut d = dst_off;
    while remaining > 0 {
        let (sc, so) = ChunkedStorage::<T, C1>::locate_pub(s);
        let (dc, doff) = ChunkedStorage::<T, C2>::locate_pub(d);
        let take = ((C1 - so).min(C2 - doff) as u64).min(remaining) as usize;
        dst.chunk_mut(dc)[doff..doff + take].clone_from_slice(&src.chunk(sc)[so..so + take]);
        s += take as u64;
        d += take as u64;
        remaining -= take as u64;
    }
    Ok(())
}

/// Copy `count` elements out of `src[src_off..]` into a plain destination
/// slice (`dst.len() == count` is required).
pub fn copy_to_slice<T, const C: usize>(
    src: &ChunkedStorage<T, C>,
    src_off: u64,
    dst: &mut [T],
) -> Result<()>
where
    T: Clone + Default,
{
    let count = dst.len() as u64;
    src.check_range_pub(src_off, count)?;
    let mut remaining = count;
    let mut s = src_off;
    let mut written = 0usize;
    while remaining > 0 {
        let (sc, so) = ChunkedStorage::<T, C>::locate_pub(s);
        let take = ((C - so) as u64).min(remaining) as usize;
        dst[written..written + take].clone_from_slice(&src.chunk(sc)[so..so + take]);
        s += take as u64;
        written += take;
        remaining -= take as u64;
    }
    Ok(())
}

/// Copy every element of `src` into `dst[dst_off..]`, growing `dst` if needed
/// so the destination range is in bounds (mirrors `extend_from_slice` when
/// `dst_off == dst.len()`, but also supports overwriting an existing range).
pub fn copy_from_slice<T, const C: usize>(
    dst: &mut ChunkedStorage<T, C>,
    dst_off: u64,
    src: &[T],
) -> Result<()>
where
    T: Clone + Default,
{
    let count = src.len() as u64;
    let needed = dst_off
        .checked_add(count)
        .ok_or_else(|| Error::out_of_range("dst_off + count overflows u64".to_string()))?;
    if needed > dst.len() {
        return Err(Error::out_of_range(format!(
            "range [{dst_off}, {needed}) out of range for length {}",
            dst.len()
        )));
    }
    let mut remaining = count;
    let mut d = dst_off;
    let mut read = 0usize;
    while remaining > 0 {
        let (dc, doff) = ChunkedStorage::<T, C>::locate_pub(d);
        let take = ((C - doff) as u64).min(remaining) as usize;
        dst.chunk_mut(dc)[doff..doff + take].clone_from_slice(&src[read..read + take]);
        d += take as u64;
        read += take;
        remaining -= take as u64;
    }
    Ok(())
}

/// Copy `count` elements from `[src_off, src_off + count)` to
/// `[dst_off, dst_off + count)` within the same storage. Overlapping ranges
/// behave as if the source were first read into a temporary buffer (standard
/// memmove semantics), per spec section 4.2.
pub fn copy_within<T, const C: usize>(
    storage: &mut ChunkedStorage<T, C>,
    src_off: u64,
    dst_off: u64,
    count: u64,
) -> Result<()>
where
    T: Clone + Default,
{
    storage.check_range_pub(src_off, count)?;
    storage.check_range_pub(dst_off, count)?;
    if count == 0 {
        return Ok(());
    }
    let overlapping = src_off < dst_off + count && dst_off < src_off + count;
    if !overlapping || src_off == dst_off {
        if src_off == dst_off {
            return Ok(());
        }
        let mut remaining = count;
        let mut s = src_off;
        let mut d = dst_off;
        while remaining > 0 {
            let (sc, so) = ChunkedStorage::<T, C>::locate_pub(s);
            let (dc, doff) = ChunkedStorage::<T, C>::locate_pub(d);
            let take = ((C - so).min(C - doff) as u64).min(remaining) as usize;
            if sc == dc {
                storage.chunk_mut(sc).copy_within(so..so + take, doff);
            } else {
                let tmp: Vec<T> = storage.chunk(sc)[so..so + take].to_vec();
                storage.chunk_mut(dc)[doff..doff + take].clone_from_slice(&tmp);
            }
            s += take as u64;
            d += take as u64;
            remaining -= take as u64;
        }
        Ok(())
    } else {
        // Overlapping, non-identical ranges: stage through a temporary buffer.
        let mut tmp: Vec<T> = Vec::with_capacity(count as usize);
        for k in 0..count {
            tmp.push(storage.get(src_off + k)?.clone());
        }
        copy_from_slice(storage, dst_off, &tmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Small = ChunkedStorage<u64, 4>;

    #[test]
    fn copy_to_crosses_chunk_boundaries() {
        let mut src: Small = ChunkedStorage::new();
        for v in 0..10u64 {
            src.push(v).unwrap();
        }
        let mut dst: Small = ChunkedStorage::with_capacity(10).unwrap();
        for _ in 0..10 {
            dst.push(0).unwrap();
        }
        copy_to(&src, 2, &mut dst, 0, 6).unwrap();
        for i in 0..6u64 {
            assert_eq!(*dst.get(i).unwrap(), *src.get(i + 2).unwrap());
        }
    }

    #[test]
    fn copy_within_overlapping_forward() {
        let mut s: Small = ChunkedStorage::new();
        for v in 0..10u64 {
            s.push(v).unwrap();
        }
        // shift [0,7) to [2,9): overlap, dst_off > src_off
        copy_within(&mut s, 0, 2, 7).unwrap();
        let expect = [0u64, 1, 0, 1, 2, 3, 4, 5, 6, 9];
        for i in 0..10u64 {
            assert_eq!(*s.get(i).unwrap(), expect[i as usize]);
        }
    }

    #[test]
    fn copy_within_overlapping_backward() {
        let mut s: Small = ChunkedStorage::new();
        for v in 0..10u64 {
            s.push(v).unwrap();
        }
        // shift [2,9) to [0,7): overlap, src_off > dst_off
        copy_within(&mut s, 2, 0, 7).unwrap();
        let expect = [2u64, 3, 4, 5, 6, 7, 8, 7, 8, 9];
        for i in 0..10u64 {
            assert_eq!(*s.get(i).unwrap(), expect[i as usize]);
        }
    }

    #[test]
    fn zero_count_is_noop_but_offset_still_validated() {
        let mut s: Small = ChunkedStorage::new();
        for v in 0..4u64 {
            s.push(v).unwrap();
        }
        copy_within(&mut s, 4, 0, 0).unwrap();
        assert!(copy_within(&mut s, 5, 0, 0).is_err());
    }
}
