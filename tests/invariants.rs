//! Property-based tests for the quantified invariants of spec.md section 8.

use massive_collections::storage::{binary_search_by, sort_by, ChunkedStorage};
use proptest::prelude::*;

type TinyChunked = ChunkedStorage<i64, 8>;

fn build(values: &[i64]) -> TinyChunked {
    let mut s: TinyChunked = ChunkedStorage::new();
    for &v in values {
        s.push(v).unwrap();
    }
    s
}

proptest! {
    /// `S.set(i, v); S.get(i) == v` for every in-range index.
    #[test]
    fn set_then_get_matches(values in prop::collection::vec(any::<i64>(), 1..200), patch in any::<i64>()) {
        let mut s = build(&values);
        let i = (values.len() as u64) / 2;
        s.set(i, patch).unwrap();
        prop_assert_eq!(*s.get(i).unwrap(), patch);
    }

    /// Swap exchanges exactly the two targeted positions and leaves the rest alone.
    #[test]
    fn swap_exchanges_only_the_two_positions(values in prop::collection::vec(any::<i64>(), 2..200)) {
        let mut s = build(&values);
        let i = 0u64;
        let j = (values.len() as u64) - 1;
        let before_i = *s.get(i).unwrap();
        let before_j = *s.get(j).unwrap();
        s.swap(i, j).unwrap();
        prop_assert_eq!(*s.get(i).unwrap(), before_j);
        prop_assert_eq!(*s.get(j).unwrap(), before_i);
        for k in 1..(values.len() as u64 - 1) {
            prop_assert_eq!(*s.get(k).unwrap(), values[k as usize]);
        }
    }

    /// After `extend_from_slice`, the appended range mirrors the input slice exactly.
    #[test]
    fn extend_from_slice_mirrors_input(prefix in prop::collection::vec(any::<i64>(), 0..50), suffix in prop::collection::vec(any::<i64>(), 0..50)) {
        let mut s = build(&prefix);
        let n = s.len();
        s.extend_from_slice(&suffix).unwrap();
        for (k, expect) in suffix.iter().enumerate() {
            prop_assert_eq!(*s.get(n + k as u64).unwrap(), *expect);
        }
    }

    /// `binary_search` on a sorted range only ever reports a truly-equal index.
    #[test]
    fn binary_search_ok_implies_equal(values in prop::collection::vec(any::<i16>(), 0..200), target in any::<i16>()) {
        let mut s: ChunkedStorage<i16, 8> = ChunkedStorage::new();
        for v in values {
            s.push(v).unwrap();
        }
        sort_by(&mut s, 0, s.len(), |a, b| a.cmp(b)).unwrap();
        if let Ok(idx) = binary_search_by(&s, 0, s.len(), |x| x.cmp(&target)).unwrap() {
            prop_assert_eq!(*s.get(idx).unwrap(), target);
        }
    }

    /// `remove_at` with `preserve_order` always shrinks the length by exactly one
    /// and keeps every untouched element in its relative order.
    #[test]
    fn remove_at_preserve_order_shrinks_by_one(values in prop::collection::vec(any::<i64>(), 1..100)) {
        let mut s = build(&values);
        let len_before = s.len();
        let i = len_before / 2;
        let removed = s.remove_at(i, true).unwrap();
        prop_assert_eq!(removed, values[i as usize]);
        prop_assert_eq!(s.len(), len_before - 1);
        let mut expected = values.clone();
        expected.remove(i as usize);
        for (k, expect) in expected.iter().enumerate() {
            prop_assert_eq!(*s.get(k as u64).unwrap(), *expect);
        }
    }
}
