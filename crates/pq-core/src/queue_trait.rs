use std::error::Error as StdError;

use crate::Priority;


/// A common interface implemented by all three priority queues in this workspace.
///
/// This trait exists purely as a convenience for generic test helpers and downstream
/// benchmarking callers that want to exercise all three implementations polymorphically; none of
/// `pq-coarse`, `pq-fine`, or `pq-skiplist` rely on it internally, and a caller who only needs
/// one implementation can depend on that crate alone and ignore this trait entirely.
pub trait PriorityQueue<T> {
    /// The error an insert can fail with. Most implementations never fail, and use
    /// [`std::convert::Infallible`].
    type InsertError: StdError;

    /// Insert `item` under `priority`.
    fn insert(&self, priority: Priority, item: T) -> Result<(), Self::InsertError>;

    /// Remove and return the minimum-priority item, or `None` if the queue is empty.
    fn remove_min(&self) -> Option<(Priority, T)>;
}
