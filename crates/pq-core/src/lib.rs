//! Shared primitives for the `pq-coarse`, `pq-fine`, and `pq-skiplist` concurrent priority
//! queues: a validated [`Priority`] and [`ThreadId`], the atomic markable-reference primitive
//! used by the lock-free skiplist, the geometric level sampler, the common error types, and a
//! convenience [`PriorityQueue`] trait unifying the three implementations.

mod error;
mod height;
mod markable_ref;
mod priority;
mod queue_trait;
mod thread_id;


pub use crate::{
    error::{CapacityError, DuplicatePriorityError, ReservedThreadIdError, SentinelPriorityError},
    height::{random_height, Prng32, MAX_HEIGHT},
    markable_ref::AtomicMarkableRef,
    priority::Priority,
    queue_trait::PriorityQueue,
    thread_id::ThreadId,
};
