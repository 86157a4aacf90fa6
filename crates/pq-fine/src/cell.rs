use std::cell::RefCell;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use pq_core::{Priority, ThreadId};

/// The ownership state of a heap cell.
///
/// Mirrors the three-way status tag from the original algorithm: a cell is either unoccupied,
/// mid-transit and owned by the thread that is moving it, or settled and available for any
/// thread to read or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// No element resides here.
    Empty,
    /// An element resides here, currently owned by the thread performing the percolate that
    /// placed it.
    Owned(ThreadId),
    /// An element resides here and has settled; any thread may act on it.
    Available,
}

/// The payload of a single heap cell: its ordering key, item, and ownership [`Status`].
///
/// `item` is `None` exactly when `status == Status::Empty`; every other combination holds
/// `Some`.
pub(crate) struct CellState<T> {
    pub(crate) priority: Priority,
    pub(crate) item: Option<T>,
    pub(crate) status: Status,
}

impl<T> CellState<T> {
    fn empty() -> Self {
        Self {
            priority: Priority::head_sentinel(),
            item: None,
            status: Status::Empty,
        }
    }

    /// Swap the entire contents (priority, item, status) of two cells, as the original
    /// algorithm's `Node::swap` does — this is what lets ownership "follow" a moving element
    /// from one slot to another.
    pub(crate) fn swap_with(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.priority, &mut other.priority);
        std::mem::swap(&mut self.item, &mut other.item);
        std::mem::swap(&mut self.status, &mut other.status);
    }
}

/// A single slot of the heap array: its state behind a re-entrant lock.
///
/// Re-entrant because the owning thread's walk up or down the tree repeatedly locks a cell that
/// was, moments earlier in the same call, locked under a different role (parent, then later
/// that same index treated as the new child's parent, and so on) — a plain mutex would deadlock
/// a thread against its own earlier acquisition in that window.
pub(crate) struct Cell<T> {
    inner: ReentrantMutex<RefCell<CellState<T>>>,
}

impl<T> Cell<T> {
    pub(crate) fn empty() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(CellState::empty())),
        }
    }

    /// Lock this cell, returning a guard. Borrow the state out of the guard with
    /// [`CellGuard::state_mut`].
    pub(crate) fn lock(&self) -> CellGuard<'_, T> {
        CellGuard {
            guard: self.inner.lock(),
        }
    }
}

/// An acquired lock on a [`Cell`]. Dropping it releases the lock.
pub(crate) struct CellGuard<'a, T> {
    guard: ReentrantMutexGuard<'a, RefCell<CellState<T>>>,
}

impl<T> CellGuard<'_, T> {
    pub(crate) fn state_mut(&self) -> std::cell::RefMut<'_, CellState<T>> {
        self.guard.borrow_mut()
    }
}
