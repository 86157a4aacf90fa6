//! A lock-free concurrent priority queue backed by a probabilistic skiplist.
//!
//! Every next-pointer is an atomic "markable reference" (see [`pq_core::AtomicMarkableRef`]): a
//! single-word compare-and-swap combining the successor pointer with a deletion mark bit. Insert
//! links a new node in at level 0 first (its linearization point), then helps link it in at
//! higher levels. `remove_min` is a two-step logical-then-physical deletion: it first claims the
//! first not-yet-deleted node by winning a compare-exchange on that node's `deleted` flag (the
//! linearization point of the removal), then physically unlinks it by marking its outgoing links
//! from the top level down and swinging predecessors past it. Physically unlinked nodes are
//! reclaimed with `crossbeam-epoch`'s epoch-based garbage collection, never freed while a
//! concurrent traversal might still hold a reference to them.
//!
//! Duplicate priorities among live (not yet logically deleted) nodes are rejected; see
//! [`SkipListQueue::insert`].

mod node;
mod queue;

pub use crate::queue::SkipListQueue;
