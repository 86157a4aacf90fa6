#![expect(
    unsafe_code,
    reason = "crossbeam-epoch's Shared/Guard API requires unsafe to dereference a protected \
              pointer; pq-skiplist, the consumer of this type, also has to reach for unsafe at \
              its own traversal sites for the same reason",
)]

use std::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard, Shared};


/// Bit used inside the pointer's tag to mark a link as logically invalidated.
///
/// crossbeam-epoch reserves the low bits of a `Shared`/`Atomic` pointer for a caller-defined tag,
/// which is exactly the "single word combining a successor pointer with a deletion mark" that a
/// lock-free skiplist needs; no separate heap-allocated descriptor is required.
const MARK_BIT: usize = 1;

/// An atomic reference to a `T`, combined with a single mark bit, mutated as one unit.
///
/// This is the skiplist's markable-reference primitive (see `pq-skiplist`). All loads, stores,
/// and compare-and-swaps of a next-pointer go through this type, so the pointer and its mark bit
/// can never be observed, or updated, independently of one another.
#[derive(Debug)]
pub struct AtomicMarkableRef<T>(Atomic<T>);

impl<T> AtomicMarkableRef<T> {
    /// An unmarked null reference.
    #[must_use]
    pub fn null() -> Self {
        Self(Atomic::null())
    }

    /// Load the referenced pointer, discarding the mark bit.
    #[inline]
    #[must_use]
    pub fn load<'g>(&self, order: Ordering, guard: &'g Guard) -> Shared<'g, T> {
        self.0.load(order, guard).with_tag(0)
    }

    /// Load the referenced pointer together with its mark bit.
    #[must_use]
    pub fn load_with_mark<'g>(&self, order: Ordering, guard: &'g Guard) -> (Shared<'g, T>, bool) {
        let tagged = self.0.load(order, guard);
        (tagged.with_tag(0), is_marked(tagged))
    }

    /// Unconditionally store `new` with the given mark bit.
    pub fn store<'g>(&self, new: Shared<'g, T>, mark: bool, order: Ordering) {
        self.0.store(tag_with_mark(new, mark), order);
    }

    /// Atomically compare-and-swap both the pointer and the mark bit.
    ///
    /// On success, returns the previous (now-replaced) pointer with its mark bit discarded.
    /// On failure, returns the pointer and mark bit actually found.
    pub fn compare_exchange<'g>(
        &self,
        expected:      Shared<'g, T>,
        expected_mark: bool,
        new:           Shared<'g, T>,
        new_mark:      bool,
        success:       Ordering,
        failure:       Ordering,
        guard:         &'g Guard,
    ) -> Result<Shared<'g, T>, (Shared<'g, T>, bool)> {
        let expected = tag_with_mark(expected, expected_mark);
        let new      = tag_with_mark(new, new_mark);

        self.0
            .compare_exchange(expected, new, success, failure, guard)
            .map(|prev| prev.with_tag(0))
            .map_err(|err| (err.current.with_tag(0), is_marked(err.current)))
    }
}

#[inline]
fn tag_with_mark<T>(ptr: Shared<'_, T>, mark: bool) -> Shared<'_, T> {
    ptr.with_tag(if mark { MARK_BIT } else { 0 })
}

#[inline]
fn is_marked<T>(ptr: Shared<'_, T>) -> bool {
    ptr.tag() & MARK_BIT != 0
}


#[cfg(test)]
mod tests {
    use crossbeam_epoch::{self as epoch, Owned};

    use super::*;

    #[test]
    fn null_loads_as_null_and_unmarked() {
        let link: AtomicMarkableRef<u32> = AtomicMarkableRef::null();
        let guard = epoch::pin();
        let (ptr, mark) = link.load_with_mark(Ordering::Acquire, &guard);
        assert!(ptr.is_null());
        assert!(!mark);
    }

    #[test]
    fn store_and_load_round_trip() {
        let link: AtomicMarkableRef<u32> = AtomicMarkableRef::null();
        let guard = epoch::pin();

        let boxed = Owned::new(7_u32).into_shared(&guard);
        link.store(boxed, false, Ordering::Release);

        let (ptr, mark) = link.load_with_mark(Ordering::Acquire, &guard);
        assert!(!mark);
        // SAFETY: `boxed` was just stored and is still protected by `guard`.
        assert_eq!(unsafe { ptr.as_ref() }, Some(&7));

        // SAFETY: no other thread can observe `boxed`; nothing else holds a reference to it.
        unsafe { guard.defer_destroy(boxed) };
    }

    #[test]
    fn marking_is_independent_of_pointer_identity() {
        let link: AtomicMarkableRef<u32> = AtomicMarkableRef::null();
        let guard = epoch::pin();

        let boxed = Owned::new(11_u32).into_shared(&guard);
        link.store(boxed, false, Ordering::Release);
        link.store(boxed, true, Ordering::Release);

        let (ptr, mark) = link.load_with_mark(Ordering::Acquire, &guard);
        assert!(mark);
        // SAFETY: `boxed` is unchanged and still protected by `guard`.
        assert_eq!(unsafe { ptr.as_ref() }, Some(&11));

        // SAFETY: no other thread can observe `boxed`; nothing else holds a reference to it.
        unsafe { guard.defer_destroy(boxed) };
    }

    #[test]
    fn compare_exchange_respects_mark_bit_in_expectation() {
        let link: AtomicMarkableRef<u32> = AtomicMarkableRef::null();
        let guard = epoch::pin();

        let first = Owned::new(1_u32).into_shared(&guard);
        link.store(first, false, Ordering::Release);

        // Expecting the wrong mark bit should fail even though the pointer matches.
        let second = Owned::new(2_u32).into_shared(&guard);
        let result = link.compare_exchange(
            first, true, second, false, Ordering::AcqRel, Ordering::Acquire, &guard,
        );
        assert!(result.is_err());

        // Expecting the right pointer and mark succeeds.
        let result = link.compare_exchange(
            first, false, second, false, Ordering::AcqRel, Ordering::Acquire, &guard,
        );
        assert!(result.is_ok());

        // SAFETY: replaced by the successful compare_exchange above; no one else can see it.
        unsafe { guard.defer_destroy(first) };
        // SAFETY: never observed after the test ends.
        unsafe { guard.defer_destroy(second) };
    }
}
