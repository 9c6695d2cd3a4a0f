//! Two-level chunked storage: a 64-bit-indexed contiguous logical sequence
//! backed by fixed-size chunks.
//!
//! Physical layout is an ordered `Vec` of chunks, each a boxed slice of
//! exactly `CHUNK` elements (I-A2). The last chunk may be logically partial;
//! elements beyond the logical length hold `T::default()` and are never
//! observable through the public API (I-A4).

use crate::constants::{DEFAULT_CHUNK_SIZE, MAX_COUNT};
use crate::error::{Error, Result};
use std::cmp::Ordering;

/// A mutable sequence of up to `MAX_COUNT` elements, stored as fixed-size
/// `CHUNK`-element chunks.
pub struct ChunkedStorage<T, const CHUNK: usize> {
    chunks: Vec<Box<[T]>>,
    count: u64,
}

/// Chunked storage using the crate's default chunk size, suitable for
/// reference-sized element types.
pub type ChunkedVec<T> = ChunkedStorage<T, DEFAULT_CHUNK_SIZE>;

impl<T: Clone + Default, const CHUNK: usize> ChunkedStorage<T, CHUNK> {
    /// Create an empty chunked storage with no allocated chunks.
    pub fn new() -> Self {
        assert!(CHUNK > 0, "CHUNK must be nonzero");
        Self {
            chunks: Vec::new(),
            count: 0,
        }
    }

    /// Create an empty chunked storage pre-allocated to hold at least
    /// `capacity` elements without a further chunk allocation.
    pub fn with_capacity(capacity: u64) -> Result<Self> {
        let mut s = Self::new();
        s.reserve(capacity)?;
        Ok(s)
    }

    /// Logical length (`Count`).
    pub fn len(&self) -> u64 {
        self.count
    }

    /// True iff `len() == 0`.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Allocated capacity (`Capacity`): `chunks.len() * CHUNK`.
    pub fn capacity(&self) -> u64 {
        self.chunks.len() as u64 * CHUNK as u64
    }

    /// Ensure `capacity() >= capacity` by allocating whole chunks.
    pub fn reserve(&mut self, capacity: u64) -> Result<()> {
        if capacity > MAX_COUNT {
            return Err(Error::capacity_exceeded(format!(
                "requested capacity {capacity} exceeds MAX_COUNT {MAX_COUNT}"
            )));
        }
        while self.capacity() < capacity {
            self.chunks.push(new_chunk::<T, CHUNK>());
            tracing::trace!(chunks = self.chunks.len(), chunk_size = CHUNK, "allocated chunk");
        }
        Ok(())
    }

    fn check_index(&self, i: u64) -> Result<()> {
        if i >= self.count {
            return Err(Error::out_of_range(format!(
                "index {i} out of range for length {}",
                self.count
            )));
        }
        Ok(())
    }

    /// Validate `[offset, offset + count)` against the current length.
    /// Exposed to sibling modules (`bulk`) so they can reuse the same bounds
    /// checks this type already performs for its own methods.
    pub(crate) fn check_range_pub(&self, offset: u64, count: u64) -> Result<()> {
        self.check_range(offset, count)
    }

    fn check_range(&self, offset: u64, count: u64) -> Result<()> {
        if offset > self.count {
            return Err(Error::out_of_range(format!(
                "offset {offset} out of range for length {}",
                self.count
            )));
        }
        let end = offset
            .checked_add(count)
            .ok_or_else(|| Error::out_of_range("offset + count overflows u64".to_string()))?;
        if end > self.count {
            return Err(Error::out_of_range(format!(
                "range [{offset}, {end}) out of range for length {}",
                self.count
            )));
        }
        Ok(())
    }

    #[inline]
    fn locate(i: u64) -> (usize, usize) {
        ((i / CHUNK as u64) as usize, (i % CHUNK as u64) as usize)
    }

    /// Resolve a logical index to `(chunk index, offset within chunk)`.
    /// Exposed to `bulk` for chunk-aware walks across two storages.
    #[inline]
    pub(crate) fn locate_pub(i: u64) -> (usize, usize) {
        Self::locate(i)
    }

    /// Borrow one whole chunk. Exposed to `bulk`'s chunk-boundary copy loops.
    #[inline]
    pub(crate) fn chunk(&self, idx: usize) -> &[T] {
        &self.chunks[idx]
    }

    /// Mutably borrow one whole chunk. Exposed to `bulk`'s chunk-boundary copy loops.
    #[inline]
    pub(crate) fn chunk_mut(&mut self, idx: usize) -> &mut [T] {
        &mut self.chunks[idx]
    }

    /// Read the element at logical index `i`. O(1).
    pub fn get(&self, i: u64) -> Result<&T> {
        self.check_index(i)?;
        let (c, o) = Self::locate(i);
        Ok(&self.chunks[c][o])
    }

    /// Take a mutable reference to the element at logical index `i`. Its
    /// validity ends at the next structural mutation (push/remove/sort/...).
    pub fn get_mut(&mut self, i: u64) -> Result<&mut T> {
        self.check_index(i)?;
        let (c, o) = Self::locate(i);
        Ok(&mut self.chunks[c][o])
    }

    /// Overwrite the element at logical index `i`.
    pub fn set(&mut self, i: u64, value: T) -> Result<()> {
        self.check_index(i)?;
        let (c, o) = Self::locate(i);
        self.chunks[c][o] = value;
        Ok(())
    }

    /// Append `value`, growing by one chunk if the storage is at capacity.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.count >= MAX_COUNT {
            return Err(Error::capacity_exceeded(format!(
                "push would exceed MAX_COUNT {MAX_COUNT}"
            )));
        }
        if self.count == self.capacity() {
            self.chunks.push(new_chunk::<T, CHUNK>());
        }
        let (c, o) = Self::locate(self.count);
        self.chunks[c][o] = value;
        self.count += 1;
        Ok(())
    }

    /// Append every element of `slice` in order, growing as needed.
    pub fn extend_from_slice(&mut self, slice: &[T]) -> Result<()> {
        let new_len = self
            .count
            .checked_add(slice.len() as u64)
            .ok_or_else(|| Error::capacity_exceeded("length overflow".to_string()))?;
        if new_len > MAX_COUNT {
            return Err(Error::capacity_exceeded(format!(
                "extend would grow length to {new_len}, exceeding MAX_COUNT {MAX_COUNT}"
            )));
        }
        self.reserve(new_len)?;
        let mut i = self.count;
        for item in slice {
            let (c, o) = Self::locate(i);
            self.chunks[c][o] = item.clone();
            i += 1;
        }
        self.count = new_len;
        Ok(())
    }

    /// Append `count` elements read from `other` starting at `offset`.
    pub fn extend_from_chunked<const CHUNK2: usize>(
        &mut self,
        other: &ChunkedStorage<T, CHUNK2>,
        offset: u64,
        count: u64,
    ) -> Result<()> {
        other.check_range(offset, count)?;
        let new_len = self
            .count
            .checked_add(count)
            .ok_or_else(|| Error::capacity_exceeded("length overflow".to_string()))?;
        if new_len > MAX_COUNT {
            return Err(Error::capacity_exceeded(format!(
                "extend would grow length to {new_len}, exceeding MAX_COUNT {MAX_COUNT}"
            )));
        }
        self.reserve(new_len)?;
        for k in 0..count {
            let (sc, so) = ChunkedStorage::<T, CHUNK2>::locate(offset + k);
            let (dc, doff) = Self::locate(self.count + k);
            self.chunks[dc][doff] = other.chunks[sc][so].clone();
        }
        self.count = new_len;
        Ok(())
    }

    /// Reset `Count` to 0. Chunks are retained, not deallocated.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Remove the element at logical index `i`.
    ///
    /// If `preserve_order`, shifts the tail left by one (O(Count - i)).
    /// Otherwise swaps the last element into position `i` (O(1)).
    pub fn remove_at(&mut self, i: u64, preserve_order: bool) -> Result<T> {
        self.check_index(i)?;
        let (c, o) = Self::locate(i);
        let removed = std::mem::take(&mut self.chunks[c][o]);
        if preserve_order {
            let mut k = i;
            while k + 1 < self.count {
                let (fc, fo) = Self::locate(k + 1);
                let (tc, to) = Self::locate(k);
                let moved = self.chunks[fc][fo].clone();
                self.chunks[tc][to] = moved;
                k += 1;
            }
        } else if i + 1 != self.count {
            let last = self.count - 1;
            let (lc, lo) = Self::locate(last);
            let last_val = self.chunks[lc][lo].clone();
            self.chunks[c][o] = last_val;
        }
        self.count -= 1;
        Ok(removed)
    }

    /// Swap the elements at logical indices `i` and `j`.
    pub fn swap(&mut self, i: u64, j: u64) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Ok(());
        }
        let (ci, oi) = Self::locate(i);
        let (cj, oj) = Self::locate(j);
        if ci == cj {
            self.chunks[ci].swap(oi, oj);
            return Ok(());
        }
        let (lo_c, lo_o, hi_c, hi_o) = if ci < cj {
            (ci, oi, cj, oj)
        } else {
            (cj, oj, ci, oi)
        };
        let (left, right) = self.chunks.split_at_mut(hi_c);
        std::mem::swap(&mut left[lo_c][lo_o], &mut right[0][hi_o]);
        Ok(())
    }

    /// Read element `i` without a bounds check. Caller must ensure `i < len()`.
    #[inline]
    fn get_unchecked(&self, i: u64) -> &T {
        let (c, o) = Self::locate(i);
        &self.chunks[c][o]
    }
}

impl<T: Clone + Default, const CHUNK: usize> Default for ChunkedStorage<T, CHUNK> {
    fn default() -> Self {
        Self::new()
    }
}

fn new_chunk<T: Clone + Default, const CHUNK: usize>() -> Box<[T]> {
    vec![T::default(); CHUNK].into_boxed_slice()
}

/// In-place, chunk-aware sort over `[offset, offset + count)` using a
/// median-of-three quicksort with an insertion-sort fallback for small
/// partitions (spec 4.1). `cmp` must be a strict weak order; a comparator
/// that panics leaves the range as some permutation of the original.
pub fn sort_by<T, const CHUNK: usize, F>(
    storage: &mut ChunkedStorage<T, CHUNK>,
    offset: u64,
    count: u64,
    mut cmp: F,
) -> Result<()>
where
    T: Clone + Default,
    F: FnMut(&T, &T) -> Ordering,
{
    storage.check_range(offset, count)?;
    if count < 2 {
        return Ok(());
    }
    quicksort_range(storage, offset, offset + count, &mut cmp);
    Ok(())
}

fn quicksort_range<T, const CHUNK: usize, F>(
    storage: &mut ChunkedStorage<T, CHUNK>,
    mut lo: u64,
    mut hi: u64, // exclusive
    cmp: &mut F,
) where
    T: Clone + Default,
    F: FnMut(&T, &T) -> Ordering,
{
    use crate::constants::SORT_INSERTION_THRESHOLD as THRESH;
    loop {
        let len = hi - lo;
        if len < 2 {
            return;
        }
        if len as usize <= THRESH {
            insertion_sort_range(storage, lo, hi, cmp);
            return;
        }
        let mid = lo + len / 2;
        let last = hi - 1;
        // After this, storage[lo] <= storage[mid] <= storage[last].
        median_of_three(storage, lo, mid, last, cmp);
        let _ = storage.swap(mid, last);
        let pivot = storage.get_unchecked(last).clone();

        // Lomuto partition: never decrements an index, so it stays safe over
        // the unsigned 64-bit logical domain without underflow guards.
        let mut store_idx = lo;
        let mut k = lo;
        while k < last {
            if cmp(storage.get_unchecked(k), &pivot) == Ordering::Less {
                let _ = storage.swap(k, store_idx);
                store_idx += 1;
            }
            k += 1;
        }
        let _ = storage.swap(store_idx, last);

        // Recurse into the smaller side first to bound stack depth, then loop
        // on the larger side (tail-call elimination by hand).
        if store_idx - lo < hi - (store_idx + 1) {
            quicksort_range(storage, lo, store_idx, cmp);
            lo = store_idx + 1;
        } else {
            quicksort_range(storage, store_idx + 1, hi, cmp);
            hi = store_idx;
        }
    }
}

fn median_of_three<T, const CHUNK: usize, F>(
    storage: &mut ChunkedStorage<T, CHUNK>,
    a: u64,
    b: u64,
    c: u64,
    cmp: &mut F,
) where
    T: Clone + Default,
    F: FnMut(&T, &T) -> Ordering,
{
    if cmp(storage.get_unchecked(a), storage.get_unchecked(b)) == Ordering::Greater {
        let _ = storage.swap(a, b);
    }
    if cmp(storage.get_unchecked(b), storage.get_unchecked(c)) == Ordering::Greater {
        let _ = storage.swap(b, c);
        if cmp(storage.get_unchecked(a), storage.get_unchecked(b)) == Ordering::Greater {
            let _ = storage.swap(a, b);
        }
    }
}

fn insertion_sort_range<T, const CHUNK: usize, F>(
    storage: &mut ChunkedStorage<T, CHUNK>,
    lo: u64,
    hi: u64,
    cmp: &mut F,
) where
    T: Clone + Default,
    F: FnMut(&T, &T) -> Ordering,
{
    let mut i = lo + 1;
    while i < hi {
        let mut j = i;
        while j > lo && cmp(storage.get_unchecked(j - 1), storage.get_unchecked(j)) == Ordering::Greater
        {
            let _ = storage.swap(j - 1, j);
            j -= 1;
        }
        i += 1;
    }
}

/// Binary search `[offset, offset + count)` of an already-sorted range.
/// `Ok(i)` means `cmp(storage[i], target) == Equal`; `Err(p)` is the
/// insertion point that keeps the range sorted.
pub fn binary_search_by<T, const CHUNK: usize, F>(
    storage: &ChunkedStorage<T, CHUNK>,
    offset: u64,
    count: u64,
    mut cmp: F,
) -> Result<std::result::Result<u64, u64>>
where
    T: Clone + Default,
    F: FnMut(&T) -> Ordering,
{
    storage.check_range(offset, count)?;
    let mut lo = offset;
    let mut hi = offset + count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp(storage.get_unchecked(mid)) {
            Ordering::Equal => return Ok(Ok(mid)),
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
        }
    }
    Ok(Err(lo))
}

/// Traverse `[offset, offset + count)` chunk-by-chunk, invoking `action` once
/// per element. Index arithmetic is hoisted once per chunk rather than
/// recomputed per element, the fast path spec 4.1/4.2 require.
pub fn do_for_each<T, const CHUNK: usize, F>(
    storage: &ChunkedStorage<T, CHUNK>,
    offset: u64,
    count: u64,
    mut action: F,
) -> Result<()>
where
    T: Clone + Default,
    F: FnMut(u64, &T),
{
    storage.check_range(offset, count)?;
    if count == 0 {
        return Ok(());
    }
    let mut remaining = count;
    let mut logical = offset;
    while remaining > 0 {
        let (c, o) = ChunkedStorage::<T, CHUNK>::locate(logical);
        let chunk = &storage.chunks[c];
        let take = (CHUNK - o).min(remaining as usize);
        for k in 0..take {
            action(logical + k as u64, &chunk[o + k]);
        }
        logical += take as u64;
        remaining -= take as u64;
    }
    Ok(())
}

/// Like [`do_for_each`], but threads a caller-owned mutable state record
/// through the traversal instead of capturing it in a closure — useful when
/// the per-element action must avoid allocating a fresh closure per call.
pub fn do_for_each_with<T, const CHUNK: usize, U, F>(
    storage: &ChunkedStorage<T, CHUNK>,
    offset: u64,
    count: u64,
    state: &mut U,
    mut action: F,
) -> Result<()>
where
    T: Clone + Default,
    F: FnMut(&mut U, u64, &T),
{
    storage.check_range(offset, count)?;
    if count == 0 {
        return Ok(());
    }
    let mut remaining = count;
    let mut logical = offset;
    while remaining > 0 {
        let (c, o) = ChunkedStorage::<T, CHUNK>::locate(logical);
        let chunk = &storage.chunks[c];
        let take = (CHUNK - o).min(remaining as usize);
        for k in 0..take {
            action(state, logical + k as u64, &chunk[o + k]);
        }
        logical += take as u64;
        remaining -= take as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    type SmallChunked = ChunkedStorage<u64, 4>;

    #[test]
    fn push_get_roundtrip() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in [5u64, 3, 1, 4, 2] {
            s.push(v).unwrap();
        }
        assert_eq!(s.len(), 5);
        assert_eq!(*s.get(0).unwrap(), 5);
        assert_eq!(s.capacity(), 8); // two chunks of 4
    }

    #[test]
    fn set_then_get_matches() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..10u64 {
            s.push(v).unwrap();
        }
        s.set(7, 99).unwrap();
        assert_eq!(*s.get(7).unwrap(), 99);
    }

    #[test]
    fn swap_exchanges_values() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..10u64 {
            s.push(v).unwrap();
        }
        s.swap(1, 8).unwrap();
        assert_eq!(*s.get(1).unwrap(), 8);
        assert_eq!(*s.get(8).unwrap(), 1);
        assert_eq!(*s.get(0).unwrap(), 0);
    }

    #[test]
    fn out_of_range_rejected() {
        let s: SmallChunked = ChunkedStorage::new();
        assert!(matches!(s.get(0), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn sort_and_binary_search_chunk_boundary() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in [5u64, 3, 1, 4, 2] {
            s.push(v).unwrap();
        }
        sort_by(&mut s, 0, 5, |a, b| a.cmp(b)).unwrap();
        let collected: Vec<u64> = (0..5).map(|i| *s.get(i).unwrap()).collect();
        assert_eq!(collected, vec![1, 2, 3, 4, 5]);

        assert_eq!(
            binary_search_by(&s, 0, 5, |x| x.cmp(&3)).unwrap(),
            Ok(2)
        );
        assert_eq!(
            binary_search_by(&s, 0, 5, |x| x.cmp(&0)).unwrap(),
            Err(0)
        );
    }

    #[test]
    fn remove_at_preserve_order_shifts_tail() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..5u64 {
            s.push(v).unwrap();
        }
        let removed = s.remove_at(1, true).unwrap();
        assert_eq!(removed, 1);
        let collected: Vec<u64> = (0..s.len()).map(|i| *s.get(i).unwrap()).collect();
        assert_eq!(collected, vec![0, 2, 3, 4]);
    }

    #[test]
    fn remove_at_unordered_swaps_last() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..5u64 {
            s.push(v).unwrap();
        }
        let removed = s.remove_at(1, false).unwrap();
        assert_eq!(removed, 1);
        let collected: Vec<u64> = (0..s.len()).map(|i| *s.get(i).unwrap()).collect();
        assert_eq!(collected, vec![0, 4, 2, 3]);
    }

    #[test]
    fn extend_from_slice_crosses_chunk_boundary() {
        let mut s: SmallChunked = ChunkedStorage::new();
        s.push(0).unwrap();
        let n = s.len();
        let xs = [10u64, 20, 30, 40, 50];
        s.extend_from_slice(&xs).unwrap();
        for (i, x) in xs.iter().enumerate() {
            assert_eq!(*s.get(n + i as u64).unwrap(), *x);
        }
    }

    #[test]
    fn clear_retains_chunks_but_resets_count() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..9u64 {
            s.push(v).unwrap();
        }
        let cap_before = s.capacity();
        s.clear();
        assert_eq!(s.len(), 0);
        assert_eq!(s.capacity(), cap_before);
    }

    #[test]
    fn do_for_each_visits_every_index_once() {
        let mut s: SmallChunked = ChunkedStorage::new();
        for v in 0..9u64 {
            s.push(v).unwrap();
        }
        let mut seen = Vec::new();
        do_for_each(&s, 0, s.len(), |i, v| seen.push((i, *v))).unwrap();
        assert_eq!(seen.len(), 9);
        for (i, v) in seen {
            assert_eq!(i, v);
        }
    }

    #[test]
    fn zero_count_is_noop_but_validates_offset() {
        let s: SmallChunked = ChunkedStorage::new();
        do_for_each(&s, 0, 0, |_, _: &u64| panic!("should not be called")).unwrap();
        assert!(do_for_each(&s, 1, 0, |_, _: &u64| {}).is_err());
    }
}
