//! Cross-module end-to-end scenarios (spec.md section 8's six numbered
//! scenarios), each driving the public API the way an embedding application
//! would rather than poking at internals.

use massive_collections::cache::{BoundingBox, CacheOptions, Codec, ShardedDiskCache, SpatialShardedCache};
use massive_collections::storage::{binary_search_by, sort_by, ChunkedStorage};
use massive_collections::view::{ChangeAction, ObservableVec, View};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type TinyChunked = ChunkedStorage<u64, 4>;

#[test]
fn scenario_1_chunked_push_get_sort() {
    let mut s: TinyChunked = ChunkedStorage::new();
    for v in [5u64, 3, 1, 4, 2] {
        s.push(v).unwrap();
    }
    assert_eq!(s.len(), 5);
    assert_eq!(*s.get(0).unwrap(), 5);

    sort_by(&mut s, 0, 5, |a, b| a.cmp(b)).unwrap();
    let collected: Vec<u64> = (0..5).map(|i| *s.get(i).unwrap()).collect();
    assert_eq!(collected, vec![1, 2, 3, 4, 5]);

    assert_eq!(binary_search_by(&s, 0, 5, |x| x.cmp(&3)).unwrap(), Ok(2));
    assert_eq!(binary_search_by(&s, 0, 5, |x| x.cmp(&0)).unwrap(), Err(0));
}

#[test]
fn scenario_2_sharded_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let options = CacheOptions::new(dir.path().join("shard"))
        .degree_of_parallelism(4)
        .overwrite_existing(true);
    let cache: ShardedDiskCache<i64, String> =
        ShardedDiskCache::open(Codec::<i64>::integer(), Codec::<String>::text(), options).unwrap();

    let items: Vec<(i64, String)> = (1..=100i64).map(|i| (i, format!("v{i}"))).collect();
    cache.set_many(&items).unwrap();
    assert_eq!(cache.count().unwrap(), 100);

    assert_eq!(cache.try_get(&42).unwrap(), Some("v42".to_string()));

    cache.remove(&42).unwrap();
    assert_eq!(cache.try_get(&42).unwrap(), None);
    assert_eq!(cache.count().unwrap(), 99);
}

#[test]
fn scenario_3_spatial_query() {
    let dir = tempfile::tempdir().unwrap();
    let options = CacheOptions::new(dir.path().join("shard"))
        .degree_of_parallelism(2)
        .overwrite_existing(true);
    let cache: SpatialShardedCache<String> = SpatialShardedCache::open(Codec::<String>::text(), options).unwrap();

    cache.set(1, &"x".to_string(), BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap()).unwrap();
    cache.set(2, &"y".to_string(), BoundingBox::new(10.0, 11.0, 10.0, 11.0).unwrap()).unwrap();
    cache.set(3, &"z".to_string(), BoundingBox::new(0.5, 0.8, 0.5, 0.8).unwrap()).unwrap();

    let mut found: Vec<i64> = cache
        .query(BoundingBox::new(0.0, 2.0, 0.0, 2.0).unwrap())
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    found.sort();
    assert_eq!(found, vec![1, 3]);

    let none = cache.query(BoundingBox::new(5.0, 6.0, 5.0, 6.0).unwrap()).unwrap();
    assert!(none.is_empty());
}

#[test]
fn scenario_4_view_filter_and_sort_over_observable_list() {
    let source = Arc::new(ObservableVec::<i32>::new());
    for v in [5, 3, 1, 4, 2] {
        source.push(v).unwrap();
    }
    let view = View::with_predicate_and_comparator(
        Arc::clone(&source),
        Some(Box::new(|v: &i32| *v > 2)),
        Some(Box::new(|a: &i32, b: &i32| a.cmp(b))),
    );
    assert_eq!(view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(), vec![3, 4, 5]);

    source.push(10).unwrap();
    assert_eq!(view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(), vec![3, 4, 5, 10]);

    source.push(1).unwrap();
    assert_eq!(view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(), vec![3, 4, 5, 10]);
}

#[test]
fn scenario_5_suspended_notifications_collapse_to_one_reset() {
    let source = Arc::new(ObservableVec::<i32>::new());
    source.push(1).unwrap();
    let view = View::new(Arc::clone(&source));

    let resets = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&resets);
    let _sub = view.on_item_changed(Box::new(move |event| {
        if event.action == ChangeAction::Reset {
            counted.fetch_add(1, Ordering::SeqCst);
        }
    }));

    {
        let _guard = view.suspend_notifications();
        source.push(2).unwrap();
        source.push(3).unwrap();
        assert_eq!(resets.load(Ordering::SeqCst), 0, "no notification while suspended");
    }
    assert_eq!(resets.load(Ordering::SeqCst), 1, "exactly one reset after the guard drops");
}

#[test]
fn scenario_6_read_only_cache_rejects_mutation() {
    let dir = tempfile::tempdir().unwrap();
    {
        let options = CacheOptions::new(dir.path().join("shard"))
            .degree_of_parallelism(1)
            .overwrite_existing(true);
        let cache: ShardedDiskCache<i64, String> =
            ShardedDiskCache::open(Codec::<i64>::integer(), Codec::<String>::text(), options).unwrap();
        cache.set(&7, &"seven".to_string()).unwrap();
        cache.close().unwrap();
    }

    let ro_options = CacheOptions::new(dir.path().join("shard"))
        .degree_of_parallelism(1)
        .read_only(true);
    let ro_cache: ShardedDiskCache<i64, String> =
        ShardedDiskCache::open(Codec::<i64>::integer(), Codec::<String>::text(), ro_options).unwrap();

    assert!(ro_cache.set(&8, &"eight".to_string()).is_err());
    assert_eq!(ro_cache.try_get(&7).unwrap(), Some("seven".to_string()));
}
