#![expect(
    unsafe_code,
    reason = "traversing and reclaiming skiplist nodes requires dereferencing crossbeam-epoch \
              pointers",
)]

use std::ptr;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use oorandom::Rand32;
use parking_lot::Mutex;

use pq_core::{random_height, DuplicatePriorityError, Priority, PriorityQueue, MAX_HEIGHT};

use crate::node::Node;

/// The "fun default seed" every queue starts with unless [`SkipListQueue::new_seeded`] is used,
/// matching LevelDB's own skiplist default.
const DEFAULT_SEED: u64 = 0x_dead_beef;

/// A lock-free concurrent priority queue backed by a skiplist.
///
/// Every mutation goes through a single-word compare-and-swap on some node's
/// [`pq_core::AtomicMarkableRef`] successor; no thread ever blocks on a mutex to read or modify
/// the list's structure (the one exception is the tiny, uncontended lock around this queue's
/// private height-sampling PRNG, which is off the hot comparison/link path). Removed nodes are
/// reclaimed through `crossbeam-epoch`'s epoch-based garbage collection once no pinned thread can
/// still observe them.
pub struct SkipListQueue<T> {
    head: Atomic<Node<T>>,
    tail: Atomic<Node<T>>,
    prng: Mutex<Rand32>,
    /// Ceiling passed to [`random_height`] when sampling a new node's level. Always in
    /// `1..=MAX_HEIGHT`; the sentinels themselves always carry `MAX_HEIGHT` levels regardless of
    /// this value, so narrowing it only ever affects future inserts, never existing structure.
    max_height: usize,
}

impl<T> SkipListQueue<T> {
    /// Create a new, empty queue, seeded with a fixed default value and sampling node heights up
    /// to [`MAX_HEIGHT`].
    ///
    /// Use [`Self::new_seeded`] for reproducible behavior under a caller-chosen seed (tests and
    /// benchmarks that want deterministic level distributions, for instance), or
    /// [`Self::with_max_height`] to cap tower height below [`MAX_HEIGHT`] for memory-constrained
    /// deployments.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_height_seeded(MAX_HEIGHT, DEFAULT_SEED)
    }

    /// Create a new, empty queue, whose node heights are sampled from a PRNG seeded with `seed`.
    #[must_use]
    pub fn new_seeded(seed: u64) -> Self {
        Self::with_max_height_seeded(MAX_HEIGHT, seed)
    }

    /// Create a new, empty queue whose node heights are sampled in `1..=max_height`, seeded with a
    /// fixed default value.
    ///
    /// # Panics
    ///
    /// Panics if `max_height` is `0` or exceeds [`MAX_HEIGHT`].
    #[must_use]
    pub fn with_max_height(max_height: usize) -> Self {
        Self::with_max_height_seeded(max_height, DEFAULT_SEED)
    }

    /// Combines [`Self::with_max_height`] and [`Self::new_seeded`].
    ///
    /// # Panics
    ///
    /// Panics if `max_height` is `0` or exceeds [`MAX_HEIGHT`].
    #[must_use]
    pub fn with_max_height_seeded(max_height: usize, seed: u64) -> Self {
        assert!(
            (1..=MAX_HEIGHT).contains(&max_height),
            "max_height must be in 1..={MAX_HEIGHT}, got {max_height}",
        );

        let guard = epoch::pin();

        let tail =
            Owned::new(Node::sentinel(Priority::tail_sentinel(), MAX_HEIGHT)).into_shared(&guard);

        let head_node = Node::sentinel(Priority::head_sentinel(), MAX_HEIGHT);
        for level in 0..MAX_HEIGHT {
            head_node.next[level].store(tail, false, Ordering::Relaxed);
        }
        let head = Owned::new(head_node).into_shared(&guard);

        Self {
            head: Atomic::from(head),
            tail: Atomic::from(tail),
            prng: Mutex::new(Rand32::new(seed)),
            max_height,
        }
    }

    fn sample_height(&self) -> usize {
        random_height(&mut self.prng.lock(), self.max_height)
    }

    /// Find `priority`'s place in every level of the list, helping splice out any node whose
    /// outgoing link is already mark-bit-set along the way.
    ///
    /// Deliberately does *not* help-splice a node purely because its `deleted` flag is set: that
    /// node's `remove` is still responsible for marking its own tower top-down and winning the
    /// level-0 unmark race before handing it to epoch reclamation (see [`Self::remove`]), and a
    /// helper that spliced it out first (by link-marking, which `remove` would then find
    /// already done and bail out of before ever reaching `defer_destroy`) would leak it forever.
    /// A deleted-but-not-yet-physically-unlinked node is simply traversed through like any other
    /// live node until its owning `remove` call marks its links itself.
    ///
    /// Returns whether a live (non-deleted) node with exactly `priority` was found. On return,
    /// `preds[level]`/`succs[level]` bracket where such a node is (or would be) at every level;
    /// `succs[0]` in particular is always some node at or past `priority`, whether or not it is
    /// the live node this search was looking for — callers that need to locate a node regardless
    /// of its `deleted` state (see [`Self::remove`]) inspect `succs[0]` directly instead of
    /// relying on this method's return value.
    fn find_node<'g>(
        &self,
        priority: Priority,
        preds: &mut [Shared<'g, Node<T>>; MAX_HEIGHT],
        succs: &mut [Shared<'g, Node<T>>; MAX_HEIGHT],
        guard: &'g Guard,
    ) -> bool {
        'restart: loop {
            // SAFETY: the head node is allocated once in `new_seeded` and lives as long as `self`.
            let mut pred = unsafe { self.head.load(Ordering::Acquire, guard).deref() };

            for level in (0..MAX_HEIGHT).rev() {
                let mut curr = pred.next[level].load(Ordering::Acquire, guard);

                loop {
                    // SAFETY: every level-0-reachable chain terminates at the tail sentinel,
                    // which is never freed; `curr` is protected by `guard`.
                    let curr_ref = unsafe { curr.deref() };
                    let (succ, marked) =
                        curr_ref.next[level].load_with_mark(Ordering::Acquire, guard);

                    if marked {
                        match pred.next[level].compare_exchange(
                            curr, false, succ, false, Ordering::AcqRel, Ordering::Acquire, guard,
                        ) {
                            Ok(_) => {
                                curr = succ;
                                continue;
                            }
                            Err(_) => continue 'restart,
                        }
                    }

                    if curr_ref.priority < priority {
                        pred = curr_ref;
                        curr = succ;
                    } else {
                        break;
                    }
                }

                preds[level] = Shared::from(ptr::from_ref(pred));
                succs[level] = curr;
            }

            // SAFETY: `succs[0]` is never null; level 0 always terminates at the tail sentinel.
            let succ0 = unsafe { succs[0].deref() };
            return succ0.priority == priority && !succ0.deleted.load(Ordering::Acquire);
        }
    }

    /// Insert `value` under `priority`. Returns `false` without inserting if a live node already
    /// holds this exact priority.
    pub fn insert(&self, priority: Priority, value: T) -> bool {
        let height = self.sample_height();
        self.insert_with_height(priority, value, height)
    }

    /// Core of [`Self::insert`], parameterized on the node's height so tests can force a
    /// particular level distribution deterministically.
    fn insert_with_height(&self, priority: Priority, value: T, height: usize) -> bool {
        let guard = epoch::pin();

        let mut preds: [Shared<'_, Node<T>>; MAX_HEIGHT] = [Shared::null(); MAX_HEIGHT];
        let mut succs: [Shared<'_, Node<T>>; MAX_HEIGHT] = [Shared::null(); MAX_HEIGHT];

        if self.find_node(priority, &mut preds, &mut succs, &guard) {
            tracing::trace!(priority = priority.get(), "skiplist queue: rejected duplicate");
            return false;
        }

        let mut new_node = Owned::new(Node::new(priority, value, height));
        for level in 0..height {
            new_node.next[level].store(succs[level], false, Ordering::Relaxed);
        }
        let new_node = new_node.into_shared(&guard);

        loop {
            // SAFETY: `preds[0]` was filled in by `find_node` above and is protected by `guard`.
            let pred0 = unsafe { preds[0].deref() };
            match pred0.next[0].compare_exchange(
                succs[0], false, new_node, false, Ordering::AcqRel, Ordering::Acquire, &guard,
            ) {
                Ok(_) => break,
                Err(_) => {
                    if self.find_node(priority, &mut preds, &mut succs, &guard) {
                        // Someone else inserted this exact priority while we were retrying.
                        // SAFETY: `new_node` was never linked into the list; nothing else can
                        // have observed it.
                        unsafe { drop(new_node.into_owned()) };
                        tracing::trace!(
                            priority = priority.get(),
                            "skiplist queue: rejected duplicate after retry",
                        );
                        return false;
                    }
                    // SAFETY: `new_node` is not yet published; only this thread touches it.
                    let new_node_ref = unsafe { new_node.deref() };
                    new_node_ref.next[0].store(succs[0], false, Ordering::Relaxed);
                }
            }
        }

        for level in 1..height {
            loop {
                // SAFETY: `preds[level]` was filled in by the most recent `find_node` call.
                let pred = unsafe { preds[level].deref() };
                match pred.next[level].compare_exchange(
                    succs[level], false, new_node, false, Ordering::AcqRel, Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => break,
                    Err(_) => {
                        self.find_node(priority, &mut preds, &mut succs, &guard);
                        // SAFETY: `new_node` is already reachable at level 0, but no other thread
                        // mutates its own next-pointers; only the inserting thread does.
                        let new_node_ref = unsafe { new_node.deref() };
                        new_node_ref.next[level].store(succs[level], false, Ordering::Relaxed);
                    }
                }
            }
        }

        tracing::trace!(priority = priority.get(), height, "skiplist queue: inserted");
        true
    }

    /// Walk the level-0 chain from the head, claiming the first not-yet-deleted node by winning
    /// its `deleted` compare-exchange. Returns `None` once the tail sentinel is reached.
    fn find_and_mark_min<'g>(&self, guard: &'g Guard) -> Option<Shared<'g, Node<T>>> {
        let tail = self.tail.load(Ordering::Acquire, guard);
        // SAFETY: the head node is allocated once in `new_seeded` and lives as long as `self`.
        let head = unsafe { self.head.load(Ordering::Acquire, guard).deref() };
        let mut curr = head.next[0].load(Ordering::Acquire, guard);

        while curr != tail {
            // SAFETY: `curr` was just loaded from a reachable next-pointer and is protected by
            // `guard`.
            let curr_ref = unsafe { curr.deref() };
            if curr_ref
                .deleted
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(curr);
            }
            curr = curr_ref.next[0].load(Ordering::Acquire, guard);
        }
        None
    }

    /// Physically unlink the node already holding `priority`, which must already be logically
    /// deleted (its `deleted` flag set, typically by [`Self::find_and_mark_min`]).
    ///
    /// Returns `false` if no node with this exact priority is reachable at level 0, or if another
    /// thread's concurrent `remove` already won the level-0 unmarking race for it.
    fn remove(&self, priority: Priority, guard: &Guard) -> bool {
        let mut preds: [Shared<'_, Node<T>>; MAX_HEIGHT] = [Shared::null(); MAX_HEIGHT];
        let mut succs: [Shared<'_, Node<T>>; MAX_HEIGHT] = [Shared::null(); MAX_HEIGHT];
        // The return value intentionally goes unused: it reports liveness, but this method is
        // only ever called on a node that is already logically deleted.
        let _ = self.find_node(priority, &mut preds, &mut succs, guard);

        let node = succs[0];
        // SAFETY: `succs[0]` is never null; level 0 always terminates at the tail sentinel.
        let node_ref = unsafe { node.deref() };
        if node_ref.priority != priority {
            return false;
        }

        let top_level = node_ref.height();
        for level in (1..top_level).rev() {
            loop {
                let (succ, marked) = node_ref.next[level].load_with_mark(Ordering::Acquire, guard);
                if marked {
                    break;
                }
                if node_ref
                    .next[level]
                    .compare_exchange(succ, false, succ, true, Ordering::AcqRel, Ordering::Acquire, guard)
                    .is_ok()
                {
                    break;
                }
            }
        }

        loop {
            let (succ, marked) = node_ref.next[0].load_with_mark(Ordering::Acquire, guard);
            if marked {
                tracing::warn!(
                    priority = priority.get(),
                    "skiplist queue: lost the level-0 unmark race, another thread already spliced this node out",
                );
                return false;
            }
            match node_ref.next[0].compare_exchange(
                succ, false, succ, true, Ordering::AcqRel, Ordering::Acquire, guard,
            ) {
                Ok(_) => {
                    let mut help_preds: [Shared<'_, Node<T>>; MAX_HEIGHT] =
                        [Shared::null(); MAX_HEIGHT];
                    let mut help_succs: [Shared<'_, Node<T>>; MAX_HEIGHT] =
                        [Shared::null(); MAX_HEIGHT];
                    let _ = self.find_node(priority, &mut help_preds, &mut help_succs, guard);
                    // SAFETY: every level of `node` is now marked, so no future traversal will
                    // hand out a fresh reference to it; the `find_node` call above has already
                    // spliced it out of every predecessor that referenced it at the time of the
                    // call, and any predecessor that still references it will splice it out the
                    // next time it is traversed, before this epoch's garbage is reclaimed.
                    unsafe { guard.defer_destroy(node) };
                    return true;
                }
                Err(_) => continue,
            }
        }
    }

    /// Remove and return the minimum-priority item, or `None` if the queue is empty.
    pub fn remove_min(&self) -> Option<(Priority, T)> {
        let guard = epoch::pin();

        let node = self.find_and_mark_min(&guard)?;
        // SAFETY: `node` was just returned by `find_and_mark_min`, which is protected by `guard`.
        let node_ref = unsafe { node.deref() };
        let priority = node_ref.priority;
        // SAFETY: this call is the thread that just won `node`'s `deleted` compare-exchange.
        let value = unsafe { node_ref.take_value() };

        self.remove(priority, &guard);

        tracing::trace!(priority = priority.get(), "skiplist queue: removed min");
        Some((priority, value))
    }
}

impl<T> Default for SkipListQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SkipListQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipListQueue").finish_non_exhaustive()
    }
}

impl<T> Drop for SkipListQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can be concurrently operating on this queue,
        // so every node still reachable from `head` at level 0 is exclusively ours to free. Nodes
        // already physically unlinked by a prior `remove` were handed to `defer_destroy` then and
        // are not reachable here, so this can't double-free them.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let next = curr.deref().next[0].load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}

impl<T> PriorityQueue<T> for SkipListQueue<T> {
    type InsertError = DuplicatePriorityError;

    fn insert(&self, priority: Priority, item: T) -> Result<(), DuplicatePriorityError> {
        if Self::insert(self, priority, item) {
            Ok(())
        } else {
            Err(DuplicatePriorityError)
        }
    }

    fn remove_min(&self) -> Option<(Priority, T)> {
        Self::remove_min(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn prio(v: i64) -> Priority {
        Priority::new(v).unwrap()
    }

    #[test]
    fn empty_queue_returns_none() {
        let queue: SkipListQueue<i32> = SkipListQueue::new();
        assert_eq!(queue.remove_min(), None);
    }

    #[test]
    fn single_thread_round_trip_is_ascending() {
        let queue = SkipListQueue::new();
        let values = [3, 1, 4, 9, 5, 2, 6];
        for &v in &values {
            assert!(queue.insert(prio(v), v));
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let mut drained = Vec::new();
        while let Some((_, item)) = queue.remove_min() {
            drained.push(item);
        }
        assert_eq!(drained, sorted);
    }

    /// Spec scenario: `insert(7)`, `insert(7)` (rejected), `insert(3)`, then drain.
    #[test]
    fn duplicate_priority_is_rejected() {
        let queue = SkipListQueue::new();
        assert!(queue.insert(prio(7), "first"));
        assert!(!queue.insert(prio(7), "second"));
        assert!(queue.insert(prio(3), "third"));

        assert_eq!(queue.remove_min(), Some((prio(3), "third")));
        assert_eq!(queue.remove_min(), Some((prio(7), "first")));
        assert_eq!(queue.remove_min(), None);
    }

    #[test]
    fn with_max_height_caps_sampled_heights() {
        let queue: SkipListQueue<i32> = SkipListQueue::with_max_height(3);
        for v in 0..200 {
            assert!(queue.insert(prio(v), v));
        }
        while queue.remove_min().is_some() {}
    }

    #[test]
    #[should_panic(expected = "max_height must be in 1..=")]
    fn with_max_height_rejects_zero() {
        let _queue: SkipListQueue<i32> = SkipListQueue::with_max_height(0);
    }

    #[test]
    fn priority_is_reusable_after_removal() {
        let queue = SkipListQueue::new();
        assert!(queue.insert(prio(7), "first"));
        assert_eq!(queue.remove_min(), Some((prio(7), "first")));
        assert!(queue.insert(prio(7), "second"));
        assert_eq!(queue.remove_min(), Some((prio(7), "second")));
    }

    #[test]
    fn trait_object_impl_matches_inherent_behavior() {
        let queue = SkipListQueue::new();
        PriorityQueue::insert(&queue, prio(10), 1).unwrap();
        PriorityQueue::insert(&queue, prio(5), 2).unwrap();
        assert_eq!(PriorityQueue::remove_min(&queue), Some((prio(5), 2)));
        assert!(PriorityQueue::insert(&queue, prio(10), 3).is_err());
    }

    /// After inserting a node at the maximum height and removing it, the head sentinel's
    /// next-pointer at every level must be restored to point at the tail sentinel, with no
    /// lingering marked links.
    #[test]
    fn max_height_insert_and_remove_restores_head_to_tail() {
        let queue: SkipListQueue<&str> = SkipListQueue::new();
        assert!(queue.insert_with_height(prio(1), "tall", MAX_HEIGHT));
        assert_eq!(queue.remove_min(), Some((prio(1), "tall")));

        let guard = epoch::pin();
        let tail = queue.tail.load(Ordering::Acquire, &guard);
        // SAFETY: the head node is allocated once and lives as long as `queue`.
        let head = unsafe { queue.head.load(Ordering::Acquire, &guard).deref() };
        for level in 0..MAX_HEIGHT {
            let (succ, marked) = head.next[level].load_with_mark(Ordering::Acquire, &guard);
            assert!(!marked, "level {level} left a marked link after removal");
            assert_eq!(succ, tail, "level {level} did not collapse back to the tail sentinel");
        }
    }
}
