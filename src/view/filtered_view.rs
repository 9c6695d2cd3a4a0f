//! A read-only filtered/sorted projection over an observable source (spec
//! section 3.5 / 4.6, "Filtered/Sorted View").

use crate::error::{Error, Result};
use crate::view::observable::{ChangeEvent, ObservableSeq, Publisher, Unsubscribe};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

/// The view's shared, `'static` state: everything the source's invalidation
/// callback needs to touch. Split out from `View` itself because that
/// callback is registered on the *source's* publisher and so must be
/// `'static` — bundling the callback-reachable state behind an `Arc`
/// sidesteps lifetime tricks entirely.
struct ViewInner<T> {
    predicate: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
    comparator: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
    dirty: AtomicBool,
    index_map: RwLock<Vec<u64>>,
    suspend_depth: AtomicU64,
    suspend_start_count: Mutex<Option<u64>>,
    changed: Publisher<dyn FnMut() + Send>,
    property_changed: Publisher<dyn FnMut(&str) + Send>,
    item_changed: Publisher<dyn FnMut(&ChangeEvent<T>) + Send>,
}

impl<T> ViewInner<T> {
    fn is_suspended(&self) -> bool {
        self.suspend_depth.load(AtomicOrdering::SeqCst) > 0
    }

    /// Invoked from the source's `on_changed` callback. Marks the map dirty
    /// and, unless notifications are currently suspended, immediately
    /// re-publishes a reset notification (spec section 4.6's "schedules a
    /// reset notification").
    fn on_source_invalidated(&self) {
        self.dirty.store(true, AtomicOrdering::SeqCst);
        if !self.is_suspended() {
            self.fire_reset();
        }
    }

    fn fire_reset(&self) {
        let event = ChangeEvent::reset();
        self.item_changed.with_each(|handler| handler(&event));
        self.changed.fire();
    }
}

/// A read-only projection over `source`: an optional filter predicate, an
/// optional sort comparator, and a lazily-rebuilt index map.
///
/// `source` is an `Arc<S>` rather than a borrow: the spec's scenario 4
/// requires mutating the source (`push`) while a view observes it and is
/// used again afterward, which a `&'s S` borrow cannot express once the
/// source's mutators take `&mut self` — the view and its source must be
/// free to be held and used independently, so the view holds shared
/// ownership instead of a lifetime-bounded reference.
pub struct View<T, S: ObservableSeq<T>> {
    source: Arc<S>,
    inner: Arc<ViewInner<T>>,
}

impl<T, S> View<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: ObservableSeq<T>,
{
    /// Build a view with no filter and no sort (identity projection).
    pub fn new(source: Arc<S>) -> Self {
        Self::with_predicate_and_comparator(source, None, None)
    }

    /// Build a view filtering `source` to elements where `predicate` holds.
    pub fn with_predicate(source: Arc<S>, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self::with_predicate_and_comparator(source, Some(Box::new(predicate)), None)
    }

    /// Build a view sorting `source` by `comparator`.
    pub fn with_comparator(
        source: Arc<S>,
        comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self::with_predicate_and_comparator(source, None, Some(Box::new(comparator)))
    }

    /// Build a view with both a filter and a sort.
    pub fn with_predicate_and_comparator(
        source: Arc<S>,
        predicate: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
        comparator: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
    ) -> Self {
        let inner = Arc::new(ViewInner {
            predicate,
            comparator,
            dirty: AtomicBool::new(true),
            index_map: RwLock::new(Vec::new()),
            suspend_depth: AtomicU64::new(0),
            suspend_start_count: Mutex::new(None),
            changed: Publisher::new(),
            property_changed: Publisher::new(),
            item_changed: Publisher::new(),
        });

        // The returned `Unsubscribe` handle is intentionally dropped: the
        // view is expected to listen for the source's whole lifetime.
        let callback_inner = Arc::clone(&inner);
        let _ = source.on_changed(Box::new(move || {
            callback_inner.on_source_invalidated();
        }));

        Self { source, inner }
    }

    /// Ensure the index map satisfies I-F1–I-F3 for the current source
    /// state, rebuilding it under the exclusive lock if dirty (spec section
    /// 4.6's rebuild algorithm). Returns a read guard over the fresh map.
    fn ensure_clean(&self) -> parking_lot::RwLockReadGuard<'_, Vec<u64>> {
        if !self.inner.dirty.load(AtomicOrdering::SeqCst) {
            return self.inner.index_map.read();
        }
        let mut write = self.inner.index_map.write();
        if self.inner.dirty.load(AtomicOrdering::SeqCst) {
            let _timer = crate::metrics::VIEW_REBUILD_SECONDS.start_timer();
            write.clear();
            let source_len = self.source.len();
            match &self.inner.predicate {
                Some(pred) => {
                    for i in 0..source_len {
                        if let Ok(item) = self.source.get(i) {
                            if pred(&item) {
                                write.push(i);
                            }
                        }
                    }
                }
                None => write.extend(0..source_len),
            }
            if let Some(cmp) = &self.inner.comparator {
                if write.len() >= 2 {
                    let source = &self.source;
                    write.sort_by(|&l, &r| match (source.get(l), source.get(r)) {
                        (Ok(lv), Ok(rv)) => cmp(&lv, &rv),
                        _ => Ordering::Equal,
                    });
                }
            }
            self.inner.dirty.store(false, AtomicOrdering::SeqCst);
            tracing::trace!(len = write.len(), "rebuilt view index map");
        }
        parking_lot::RwLockWriteGuard::downgrade(write)
    }

    /// Number of elements currently in the view (forces a rebuild if dirty).
    pub fn len(&self) -> u64 {
        self.ensure_clean().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at view-local index `i`, resolved through the index map
    /// to `source[index_map[i]]`.
    pub fn get(&self, i: u64) -> Result<T> {
        let map = self.ensure_clean();
        let source_index = *map
            .get(i as usize)
            .ok_or_else(|| Error::out_of_range(format!("view index {i} out of range")))?;
        drop(map);
        self.source.get(source_index)
    }

    /// Snapshot the index map into a freshly-allocated vector under the
    /// shared lock and iterate that snapshot (spec section 4.6's guidance
    /// for "iterators that cannot hold the lock across yields").
    pub fn iter(&self) -> ViewIter<'_, T, S> {
        let snapshot = self.ensure_clean().clone();
        ViewIter {
            view: self,
            snapshot,
            next: 0,
        }
    }

    /// Scoped suspension of the view's own notifications: on first entry,
    /// records the current count; on the guard's drop (when the outermost
    /// suspension ends), unconditionally emits one reset notification and,
    /// if the count changed while suspended, a `Count` property-changed
    /// notification (spec section 4.6).
    pub fn suspend_notifications(&self) -> SuspendGuard<'_, T, S> {
        if self.inner.suspend_depth.fetch_add(1, AtomicOrdering::SeqCst) == 0 {
            *self.inner.suspend_start_count.lock().unwrap() = Some(self.len());
        }
        SuspendGuard { view: self }
    }
}

impl<T, S> ObservableSeq<T> for View<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: ObservableSeq<T>,
{
    fn len(&self) -> u64 {
        View::len(self)
    }

    fn get(&self, index: u64) -> Result<T> {
        View::get(self, index)
    }

    fn on_changed(&self, handler: Box<dyn FnMut() + Send>) -> Unsubscribe<'_, dyn FnMut() + Send> {
        self.inner.changed.subscribe(handler)
    }

    fn on_property_changed(
        &self,
        handler: Box<dyn FnMut(&str) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&str) + Send> {
        self.inner.property_changed.subscribe(handler)
    }

    fn on_item_changed(
        &self,
        handler: Box<dyn FnMut(&ChangeEvent<T>) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&ChangeEvent<T>) + Send> {
        self.inner.item_changed.subscribe(handler)
    }
}

/// An iterator over a [`View`]'s snapshot index map, taken under the view's
/// shared lock once and then walked without holding any lock.
pub struct ViewIter<'v, T, S: ObservableSeq<T>> {
    view: &'v View<T, S>,
    snapshot: Vec<u64>,
    next: usize,
}

impl<'v, T, S> Iterator for ViewIter<'v, T, S>
where
    T: Clone + Send + Sync + 'static,
    S: ObservableSeq<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let source_index = *self.snapshot.get(self.next)?;
        self.next += 1;
        Some(self.view.source.get(source_index))
    }
}

/// Scoped suspension handle returned by [`View::suspend_notifications`].
pub struct SuspendGuard<'v, T, S: ObservableSeq<T>> {
    view: &'v View<T, S>,
}

impl<'v, T, S> Drop for SuspendGuard<'v, T, S>
where
    T: Clone + Send + Sync + 'static,
    S: ObservableSeq<T>,
{
    fn drop(&mut self) {
        if self.view.inner.suspend_depth.fetch_sub(1, AtomicOrdering::SeqCst) != 1 {
            return;
        }
        self.view.inner.fire_reset();
        let start = self.view.inner.suspend_start_count.lock().unwrap().take();
        if let Some(start) = start {
            if start != self.view.len() {
                self.view
                    .inner
                    .property_changed
                    .with_each(|handler| handler("Count"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::observable::ObservableVec;
    use std::sync::atomic::AtomicU64 as Counter;

    #[test]
    fn identity_view_mirrors_source() {
        let source = Arc::new(ObservableVec::<i32>::new());
        for v in [5, 3, 1, 4, 2] {
            source.push(v).unwrap();
        }
        let view = View::new(Arc::clone(&source));
        let got: Vec<i32> = view.iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![5, 3, 1, 4, 2]);
    }

    #[test]
    fn filter_and_sort_rebuilds_after_source_mutation() {
        let source = Arc::new(ObservableVec::<i32>::new());
        for v in [5, 3, 1, 4, 2] {
            source.push(v).unwrap();
        }
        let view = View::with_predicate_and_comparator(
            Arc::clone(&source),
            Some(Box::new(|v: &i32| *v > 2)),
            Some(Box::new(|a: &i32, b: &i32| a.cmp(b))),
        );
        assert_eq!(
            view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        source.push(10).unwrap();
        assert_eq!(
            view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(),
            vec![3, 4, 5, 10]
        );
        source.push(1).unwrap();
        assert_eq!(
            view.iter().map(|r| r.unwrap()).collect::<Vec<_>>(),
            vec![3, 4, 5, 10]
        );
    }

    #[test]
    fn suspended_notifications_collapse_to_one_reset() {
        let source = Arc::new(ObservableVec::<i32>::new());
        source.push(1).unwrap();
        let view = View::new(Arc::clone(&source));
        let fired = Arc::new(Counter::new(0));
        let f2 = Arc::clone(&fired);
        let _sub = view.on_item_changed(Box::new(move |event| {
            if event.action == crate::view::observable::ChangeAction::Reset {
                f2.fetch_add(1, AtomicOrdering::SeqCst);
            }
        }));
        {
            let _guard = view.suspend_notifications();
            source.push(2).unwrap();
            source.push(3).unwrap();
            assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
        }
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
    }
}
