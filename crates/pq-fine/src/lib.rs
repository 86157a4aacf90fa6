//! A fine-grained concurrent priority queue: a fixed-capacity array heap where each cell owns
//! its own lock, and a single global spinlock serializes only slot reservation.
//!
//! Compared to `pq-coarse`, this trades a simple global mutex for per-cell locking and an
//! explicit ownership protocol (see [`PqFine::insert`] and [`PqFine::remove_min`]), so that two
//! threads percolating in disjoint parts of the tree need not wait on each other.

mod cell;
mod queue;

pub use crate::queue::PqFine;
