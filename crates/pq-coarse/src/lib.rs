//! A coarse-grained concurrent priority queue: a single global mutex protecting a standard
//! binary heap.
//!
//! This is the reference correctness baseline of the workspace — see `pq-fine` and
//! `pq-skiplist` for implementations that trade the single global lock for finer-grained
//! synchronization in exchange for more intricate invariants.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::convert::Infallible;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use parking_lot::Mutex;

use pq_core::{Priority, PriorityQueue};


/// A min-first wrapper so [`BinaryHeap`], which is a max-heap, yields the smallest [`Priority`]
/// first. Ordered solely by `priority`; `item` never participates in comparisons.
struct Entry<T> {
    priority: Priority,
    item:     T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed, so that `BinaryHeap::pop` (which removes the greatest element) removes the
        // entry with the smallest `priority`.
        other.priority.cmp(&self.priority)
    }
}


/// A concurrent priority queue protected by a single [`parking_lot::Mutex`].
///
/// `insert` and `remove_min` both acquire the same lock around a [`BinaryHeap`]; every operation
/// is linearizable at the moment it holds that lock. This is the simplest of the workspace's
/// three queues, and the one to reach for when contention is low or correctness review matters
/// more than scalability.
pub struct CoarseQueue<T> {
    heap: Mutex<BinaryHeap<Entry<T>>>,
}

impl<T> CoarseQueue<T> {
    /// Create a new, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Insert `item` under `priority`. Never fails; the only failure mode would be allocation
    /// failure, which aborts the process per Rust's global allocator contract.
    pub fn insert(&self, priority: Priority, item: T) {
        let mut heap = self.heap.lock();
        heap.push(Entry { priority, item });
        tracing::trace!(priority = priority.get(), "coarse queue: inserted");
    }

    /// Remove and return the minimum-priority item, or `None` if the queue is empty.
    pub fn remove_min(&self) -> Option<(Priority, T)> {
        let mut heap = self.heap.lock();
        let popped = heap.pop();
        drop(heap);

        match &popped {
            Some(entry) => tracing::trace!(priority = entry.priority.get(), "coarse queue: removed min"),
            None        => tracing::trace!("coarse queue: remove_min on empty queue"),
        }

        popped.map(|entry| (entry.priority, entry.item))
    }

    /// The number of items currently resident in the queue.
    ///
    /// Like any concurrently-accessed size, this is a snapshot: by the time the caller observes
    /// it, another thread may already have changed it.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Whether the queue held no items at the moment of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

impl<T> Default for CoarseQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for CoarseQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CoarseQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> PriorityQueue<T> for CoarseQueue<T> {
    type InsertError = Infallible;

    fn insert(&self, priority: Priority, item: T) -> Result<(), Infallible> {
        Self::insert(self, priority, item);
        Ok(())
    }

    fn remove_min(&self) -> Option<(Priority, T)> {
        Self::remove_min(self)
    }
}
