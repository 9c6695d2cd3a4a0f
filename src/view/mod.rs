//! An observable filtered/sorted projection over a source sequence
//! (component F): a lazily-rebuilt index map behind a reader/writer lock.

pub mod filtered_view;
pub mod observable;

pub use filtered_view::{SuspendGuard, View, ViewIter};
pub use observable::{ChangeAction, ChangeEvent, ObservableSeq, ObservableVec, Publisher, Unsubscribe};
