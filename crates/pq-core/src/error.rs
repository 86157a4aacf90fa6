use thiserror::Error;


/// Returned by [`crate::Priority::new`] when given one of the two sentinel values reserved for
/// the skiplist's head/tail nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("priority {0} is reserved for the skiplist's head/tail sentinels")]
pub struct SentinelPriorityError(pub(crate) i64);

/// Returned by [`crate::ThreadId::new`] when given one of the two values reserved as fine-grained
/// status-tag sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("thread id {0} collides with a fine-grained heap status-tag sentinel")]
pub struct ReservedThreadIdError(pub(crate) i64);

/// Returned by `pq-fine`'s `insert` when the heap's backing array is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fine-grained heap is at capacity ({capacity}); insert refused")]
pub struct CapacityError {
    /// The fixed capacity the queue was constructed with.
    pub capacity: usize,
}

/// Returned by the generic [`crate::PriorityQueue`] impl for `pq-skiplist`, wrapping the plain
/// `bool` that the skiplist's inherent `insert` uses (see `pq-skiplist`'s crate docs for why the
/// inherent API avoids this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a live node already holds this priority")]
pub struct DuplicatePriorityError;
