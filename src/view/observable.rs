//! The observable-source contract the Filtered/Sorted View consumes (spec
//! section 6.2), plus `ObservableVec<T>`, a minimal chunked-storage-backed
//! implementation of it.

use crate::error::Result;
use crate::storage::chunked::ChunkedVec;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// What changed in a fine-grained item-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Clear,
    Reset,
    RangeAdd,
}

/// A single fine-grained change notification.
#[derive(Debug, Clone)]
pub struct ChangeEvent<T> {
    pub action: ChangeAction,
    pub index: u64,
    pub count: u64,
    pub item: Option<T>,
    pub old_item: Option<T>,
}

impl<T> ChangeEvent<T> {
    pub(crate) fn reset() -> Self {
        Self {
            action: ChangeAction::Reset,
            index: 0,
            count: 0,
            item: None,
            old_item: None,
        }
    }
}

/// A list of subscribers to one notification stream, each identified by a
/// monotonically increasing id so a given [`Unsubscribe`] removes exactly the
/// subscriber that produced it and no other.
pub struct Publisher<F: ?Sized> {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Box<F>)>>,
}

impl<F: ?Sized> Default for Publisher<F> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Publisher<F> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self, handler: Box<F>) -> Unsubscribe<'_, F> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, handler));
        Unsubscribe {
            id,
            publisher: self,
        }
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|(sid, _)| *sid != id);
    }

    /// Invoke `f` once per subscriber, in subscription order.
    pub(crate) fn with_each(&self, mut f: impl FnMut(&mut F)) {
        for (_, handler) in self.subscribers.lock().iter_mut() {
            f(handler);
        }
    }
}

impl<F: ?Sized> Publisher<F>
where
    F: FnMut(),
{
    pub(crate) fn fire(&self) {
        self.with_each(|handler| handler());
    }
}

/// A guard returned by `on_changed`/`on_property_changed`/`on_item_changed`.
/// Call `unsubscribe()` to stop receiving notifications; dropping it without
/// calling that method leaves the subscription active (subscriptions do not
/// unregister themselves implicitly, matching the teacher's explicit-handle
/// style rather than an RAII guard).
pub struct Unsubscribe<'a, F: ?Sized> {
    id: u64,
    publisher: &'a Publisher<F>,
}

impl<'a, F: ?Sized> Unsubscribe<'a, F> {
    pub fn unsubscribe(self) {
        self.publisher.remove(self.id);
    }
}

/// An indexable read-only sequence of `T` publishing three notification
/// streams, consumed by `View` (spec section 6.2).
pub trait ObservableSeq<T> {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: u64) -> Result<T>;

    /// Coarse "something changed" notification.
    fn on_changed(&self, handler: Box<dyn FnMut() + Send>) -> Unsubscribe<'_, dyn FnMut() + Send>;

    /// Property-changed notification, carrying the property's name.
    fn on_property_changed(
        &self,
        handler: Box<dyn FnMut(&str) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&str) + Send>;

    /// Fine-grained typed change notification.
    fn on_item_changed(
        &self,
        handler: Box<dyn FnMut(&ChangeEvent<T>) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&ChangeEvent<T>) + Send>;
}

/// A minimal observable sequence backed by [`ChunkedVec`]. Not part of the
/// spec's Chunked Storage contract itself — new glue code so `View` has a
/// conforming source to project over.
///
/// Mutators take `&self`, not `&mut self`: the source must be shared while a
/// `View` observes it (spec section 3.5's "weak ownership" over the source,
/// and scenario 4's "append to source, then re-iterate the live view"), so
/// the backing storage sits behind a lock rather than requiring exclusive
/// access to mutate — the same interior-mutability shape the disk cache
/// shards (component C) already use for their own shared, lockable state.
pub struct ObservableVec<T> {
    data: Mutex<ChunkedVec<T>>,
    changed: Publisher<dyn FnMut() + Send>,
    property_changed: Publisher<dyn FnMut(&str) + Send>,
    item_changed: Publisher<dyn FnMut(&ChangeEvent<T>) + Send>,
}

impl<T: Clone + Default> ObservableVec<T> {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(ChunkedVec::new()),
            changed: Publisher::new(),
            property_changed: Publisher::new(),
            item_changed: Publisher::new(),
        }
    }

    fn fire_item(&self, event: ChangeEvent<T>) {
        self.item_changed.with_each(|handler| handler(&event));
    }

    fn fire_property(&self, name: &str) {
        self.property_changed.with_each(|handler| handler(name));
    }

    pub fn push(&self, value: T) -> Result<()> {
        let index = {
            let mut data = self.data.lock();
            data.push(value.clone())?;
            data.len() - 1
        };
        self.fire_item(ChangeEvent {
            action: ChangeAction::Add,
            index,
            count: 1,
            item: Some(value),
            old_item: None,
        });
        self.changed.fire();
        self.fire_property("Count");
        Ok(())
    }

    pub fn set(&self, index: u64, value: T) -> Result<()> {
        let old = {
            let mut data = self.data.lock();
            let old = data.get(index)?.clone();
            data.set(index, value.clone())?;
            old
        };
        self.fire_item(ChangeEvent {
            action: ChangeAction::Replace,
            index,
            count: 1,
            item: Some(value),
            old_item: Some(old),
        });
        self.changed.fire();
        Ok(())
    }

    pub fn remove_at(&self, index: u64, preserve_order: bool) -> Result<T> {
        let old = self.data.lock().remove_at(index, preserve_order)?;
        self.fire_item(ChangeEvent {
            action: ChangeAction::Remove,
            index,
            count: 1,
            item: None,
            old_item: Some(old.clone()),
        });
        self.changed.fire();
        self.fire_property("Count");
        Ok(old)
    }

    pub fn clear(&self) {
        self.data.lock().clear();
        self.fire_item(ChangeEvent::reset());
        self.changed.fire();
        self.fire_property("Count");
    }
}

impl<T: Clone + Default> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> ObservableSeq<T> for ObservableVec<T> {
    fn len(&self) -> u64 {
        self.data.lock().len()
    }

    fn get(&self, index: u64) -> Result<T> {
        self.data.lock().get(index).map(|v| v.clone())
    }

    fn on_changed(&self, handler: Box<dyn FnMut() + Send>) -> Unsubscribe<'_, dyn FnMut() + Send> {
        self.changed.subscribe(handler)
    }

    fn on_property_changed(
        &self,
        handler: Box<dyn FnMut(&str) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&str) + Send> {
        self.property_changed.subscribe(handler)
    }

    fn on_item_changed(
        &self,
        handler: Box<dyn FnMut(&ChangeEvent<T>) + Send>,
    ) -> Unsubscribe<'_, dyn FnMut(&ChangeEvent<T>) + Send> {
        self.item_changed.subscribe(handler)
    }
}
