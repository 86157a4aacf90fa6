use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use pq_core::{CapacityError, Priority, PriorityQueue, ThreadId};

use crate::cell::{Cell, Status};

/// The fixed array index of the heap root. Index `0` is never used, matching the original
/// algorithm's one-based layout (it lets `child / 2` compute a parent without an off-by-one).
const ROOT: usize = 1;

/// A fine-grained, array-backed concurrent binary heap priority queue.
///
/// Capacity is fixed at construction. Every cell carries its own re-entrant lock and an
/// ownership [`Status`] tag; a global spinlock (`heap_lock`) serializes only the reservation and
/// release of the `next` free slot, not the per-cell work of sifting an element into place. This
/// lets independent percolations proceed in parallel once their slot has been claimed.
pub struct PqFine<T> {
    cells: Box<[Cell<T>]>,
    /// One past the highest occupied index; the next `insert` claims this slot and increments it.
    next: AtomicUsize,
    /// Test-and-set spinlock guarding `next`, mirroring `std::atomic_flag` in the original.
    heap_lock: AtomicBool,
    capacity: usize,
    /// Source of synthetic thread ids for the [`PriorityQueue`] trait impl, whose fixed
    /// signature has no room for a caller-supplied [`ThreadId`].
    auto_thread_id: AtomicI64,
}

impl<T> PqFine<T> {
    /// Create a queue that can hold at most `capacity` elements at once.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is `0`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pq-fine queue must have nonzero capacity");
        let max_limit = capacity + 1;
        let cells = (0..max_limit).map(|_| Cell::empty()).collect();
        Self {
            cells,
            next: AtomicUsize::new(ROOT),
            heap_lock: AtomicBool::new(false),
            capacity,
            auto_thread_id: AtomicI64::new(0),
        }
    }

    /// The capacity this queue was constructed with.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// A freshly minted id, unique among concurrently outstanding calls on this queue, for
    /// callers that go through the [`PriorityQueue`] trait instead of supplying their own.
    fn auto_thread_id(&self) -> ThreadId {
        let id = self.auto_thread_id.fetch_add(1, Ordering::Relaxed);
        ThreadId::new(id).expect("monotonically increasing counter starting at 0 never hits a reserved tag")
    }

    fn lock_heap(&self) {
        while self
            .heap_lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn unlock_heap(&self) {
        self.heap_lock.store(false, Ordering::Release);
    }

    fn has_right_child(&self, i: usize) -> bool {
        2 * i + 1 < self.next.load(Ordering::Acquire)
    }

    /// Insert `item` under `priority`, tagging the in-flight element with `thread_id` until it
    /// settles.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if the queue is already holding `capacity()` elements.
    pub fn insert(&self, priority: Priority, thread_id: ThreadId, item: T) -> Result<(), CapacityError> {
        self.lock_heap();
        let child = self.next.load(Ordering::Relaxed);
        if child >= self.cells.len() {
            self.unlock_heap();
            tracing::warn!(capacity = self.capacity, "fine queue: insert refused, at capacity");
            return Err(CapacityError { capacity: self.capacity });
        }
        self.next.store(child + 1, Ordering::Relaxed);

        {
            let guard = self.cells[child].lock();
            let mut state = guard.state_mut();
            state.priority = priority;
            state.item = Some(item);
            state.status = Status::Owned(thread_id);
        }
        self.unlock_heap();

        tracing::trace!(priority = priority.get(), child, "fine queue: reserved slot");

        let mut child = child;
        while child > ROOT {
            let parent = child / 2;

            let parent_guard = self.cells[parent].lock();
            let child_guard = self.cells[child].lock();
            let mut parent_state = parent_guard.state_mut();
            let mut child_state = child_guard.state_mut();

            if parent_state.status == Status::Available && child_state.status == Status::Owned(thread_id) {
                if child_state.priority < parent_state.priority {
                    child_state.swap_with(&mut parent_state);
                    drop(child_state);
                    drop(parent_state);
                    child = parent;
                    continue;
                }
                child_state.status = Status::Available;
                tracing::trace!(priority = priority.get(), settled_at = child, "fine queue: inserted");
                return Ok(());
            } else if child_state.status != Status::Owned(thread_id) {
                // Another thread already carried our element upward; follow it.
                child = parent;
            }
            // else: parent is still mid-transit. Drop both locks and retry this same child.
        }

        if child == ROOT {
            let guard = self.cells[ROOT].lock();
            let mut state = guard.state_mut();
            if state.status == Status::Owned(thread_id) {
                state.status = Status::Available;
            }
        }
        tracing::trace!(priority = priority.get(), "fine queue: inserted at root");
        Ok(())
    }

    /// Remove and return the minimum-priority item, or `None` if the queue is empty.
    ///
    /// `thread_id` need not match the id used at insertion; it only identifies this call's
    /// percolate-down as distinct from concurrent ones.
    pub fn remove_min(&self, thread_id: ThreadId) -> Option<(Priority, T)> {
        let _ = thread_id; // Percolate-down never re-parks an element under a status tag; kept for symmetry with insert.

        self.lock_heap();
        let next = self.next.load(Ordering::Relaxed);
        if next <= ROOT {
            self.unlock_heap();
            tracing::trace!("fine queue: remove_min on empty queue");
            return None;
        }
        let bottom = next - 1;
        self.next.store(bottom, Ordering::Relaxed);

        let root_guard = self.cells[ROOT].lock();
        let bottom_guard = self.cells[bottom].lock();
        self.unlock_heap();

        let (min_priority, min_item) = {
            let mut root_state = root_guard.state_mut();
            let min_priority = root_state.priority;
            let min_item = root_state.item.take().expect("root was occupied");
            root_state.status = Status::Empty;
            (min_priority, min_item)
        };

        if bottom == ROOT {
            // The heap held exactly one element; nothing to swap in.
            drop(bottom_guard);
            tracing::trace!(priority = min_priority.get(), "fine queue: removed last element");
            return Some((min_priority, min_item));
        }

        {
            let mut root_state = root_guard.state_mut();
            let mut bottom_state = bottom_guard.state_mut();
            root_state.swap_with(&mut bottom_state);
        }
        drop(bottom_guard);

        {
            let mut root_state = root_guard.state_mut();
            root_state.status = Status::Available;
        }
        drop(root_guard);

        self.percolate_down(ROOT);

        tracing::trace!(priority = min_priority.get(), "fine queue: removed min");
        Some((min_priority, min_item))
    }

    /// Sift the element currently at `start` down into place. `start`'s lock must not be held by
    /// the caller when this is invoked.
    fn percolate_down(&self, start: usize) {
        let mut parent = start;

        while parent < self.cells.len() / 2 {
            let left = parent * 2;
            let has_right = self.has_right_child(parent);
            let right = if has_right { parent * 2 + 1 } else { 0 };

            let parent_guard = self.cells[parent].lock();
            let left_guard = self.cells[left].lock();
            let right_guard = has_right.then(|| self.cells[right].lock());

            let mut parent_state = parent_guard.state_mut();
            let mut left_state = left_guard.state_mut();
            let mut right_state = right_guard.as_ref().map(|g| g.state_mut());

            if left_state.status == Status::Empty {
                break;
            }

            let left_is_smaller = match right_state.as_ref() {
                None => true,
                Some(right_state) => {
                    right_state.status == Status::Empty || left_state.priority < right_state.priority
                }
            };

            let (child, child_is_left) = if left_is_smaller { (left, true) } else { (right, false) };

            let child_empty = if child_is_left {
                left_state.status == Status::Empty
            } else {
                right_state.as_ref().is_some_and(|s| s.status == Status::Empty)
            };

            let child_priority = if child_is_left { left_state.priority } else { right_state.as_ref().unwrap().priority };

            if child_priority < parent_state.priority && !child_empty {
                if child_is_left {
                    parent_state.swap_with(&mut left_state);
                } else {
                    parent_state.swap_with(right_state.as_deref_mut().unwrap());
                }
                drop(parent_state);
                drop(left_state);
                drop(right_state);
                drop(parent_guard);
                drop(left_guard);
                drop(right_guard);
                parent = child;
            } else {
                break;
            }
        }
    }
}

impl<T> std::fmt::Debug for PqFine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PqFine")
            .field("capacity", &self.capacity)
            .field("len", &(self.next.load(Ordering::Relaxed).saturating_sub(ROOT)))
            .finish()
    }
}

impl<T> PriorityQueue<T> for PqFine<T> {
    type InsertError = CapacityError;

    fn insert(&self, priority: Priority, item: T) -> Result<(), CapacityError> {
        let thread_id = self.auto_thread_id();
        Self::insert(self, priority, thread_id, item)
    }

    fn remove_min(&self) -> Option<(Priority, T)> {
        let thread_id = self.auto_thread_id();
        Self::remove_min(self, thread_id)
    }
}
