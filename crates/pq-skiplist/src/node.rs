#![expect(
    unsafe_code,
    reason = "dereferencing crossbeam-epoch pointers and taking a node's value after it has \
              been logically deleted both require unsafe",
)]

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicBool;

use pq_core::{AtomicMarkableRef, Priority};

/// A skiplist node: an ordering key, a value slot, a logical-deletion flag, and one
/// [`AtomicMarkableRef`] successor per level it participates in.
///
/// `value` is read or taken only by the single thread that wins the `deleted` compare-exchange
/// in `find_and_mark_min` (see `queue.rs`); every other thread only ever inspects `priority` and
/// `deleted`. That single-writer discipline is what makes the `UnsafeCell` sound without a lock.
pub(crate) struct Node<T> {
    pub(crate) priority: Priority,
    value: UnsafeCell<Option<T>>,
    pub(crate) deleted: AtomicBool,
    pub(crate) next: Box<[AtomicMarkableRef<Node<T>>]>,
}

// SAFETY: `value` is only ever mutated by the thread that won the `deleted` CAS, and only once;
// every other access is read-only inspection of `priority`/`deleted`, which are themselves `Sync`.
unsafe impl<T: Send> Sync for Node<T> {}

impl<T> Node<T> {
    pub(crate) fn new(priority: Priority, value: T, height: usize) -> Self {
        Self {
            priority,
            value: UnsafeCell::new(Some(value)),
            deleted: AtomicBool::new(false),
            next: (0..height).map(|_| AtomicMarkableRef::null()).collect(),
        }
    }

    /// Build a head or tail sentinel: no value, and `height` unmarked null successors (the
    /// caller links them up immediately after).
    pub(crate) fn sentinel(priority: Priority, height: usize) -> Self {
        Self {
            priority,
            value: UnsafeCell::new(None),
            deleted: AtomicBool::new(false),
            next: (0..height).map(|_| AtomicMarkableRef::null()).collect(),
        }
    }

    pub(crate) fn height(&self) -> usize {
        self.next.len()
    }

    /// Take this node's value out.
    ///
    /// # Safety
    ///
    /// The caller must be the thread that won this node's `deleted` compare-exchange (false ->
    /// true); that win is the only synchronization establishing exclusive access to `value`.
    pub(crate) unsafe fn take_value(&self) -> T {
        // SAFETY: forwarded from this function's own safety contract.
        unsafe { &mut *self.value.get() }
            .take()
            .expect("a node not yet claimed by anyone else always still holds its value")
    }
}
