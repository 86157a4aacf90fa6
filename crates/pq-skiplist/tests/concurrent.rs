//! Concurrent end-to-end scenarios for [`pq_skiplist::SkipListQueue`].

use std::sync::{Arc, Mutex};
use std::thread;

use oorandom::Rand32;

use pq_core::Priority;
use pq_skiplist::SkipListQueue;

fn prio(v: i64) -> Priority {
    Priority::new(v).unwrap()
}

/// Installs a test-scoped trace subscriber so `tracing` output surfaces under `cargo test --
/// --nocapture`. Safe to call from every test; only the first call in a process wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Populate the queue with priorities `1..=100`, then spawn 10 threads each calling `remove_min`
/// 10 times. The union of all 100 returns must equal `{1, .., 100}` with no duplicates and
/// nothing missing.
#[test]
fn concurrent_remove_min_race_drains_each_priority_exactly_once() {
    init_tracing();
    const MAX_PRIORITY: i64 = 100;
    const THREADS: usize = 10;
    const PER_THREAD: usize = 10;

    let queue = Arc::new(SkipListQueue::new());
    for p in 1..=MAX_PRIORITY {
        assert!(queue.insert(prio(p), p));
    }

    let results = Arc::new(Mutex::new(Vec::with_capacity(THREADS * PER_THREAD)));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            thread::spawn(move || {
                let mut local = Vec::with_capacity(PER_THREAD);
                for _ in 0..PER_THREAD {
                    if let Some((priority, _)) = queue.remove_min() {
                        local.push(priority.get());
                    }
                }
                results.lock().unwrap().extend(local);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut drained = results.lock().unwrap().clone();
    drained.sort_unstable();
    let expected: Vec<i64> = (1..=MAX_PRIORITY).collect();
    assert_eq!(drained, expected);
    assert_eq!(queue.remove_min(), None);
}

/// 8 threads perform a mixed 50/50 insert / `remove_min` workload of 10,000 total operations on
/// priorities drawn uniformly from `[0, 1000)`. Afterward, draining the rest single-threaded must
/// produce a non-decreasing sequence, and the full multiset of everything ever removed (during
/// the race, plus the final drain) must equal the multiset of everything successfully inserted.
#[test]
fn mixed_insert_remove_churn_preserves_the_multiset() {
    init_tracing();
    const THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 1_250; // 8 * 1_250 == 10_000
    const PRIORITY_RANGE: u32 = 1_000;

    let queue = Arc::new(SkipListQueue::new_seeded(0xC0FF_EE00));
    let inserted: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let removed: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let inserted = Arc::clone(&inserted);
            let removed = Arc::clone(&removed);
            thread::spawn(move || {
                let mut rng = Rand32::new(0x5EED_0000 ^ t as u64);
                let mut local_inserted = Vec::new();
                let mut local_removed = Vec::new();

                for _ in 0..OPS_PER_THREAD {
                    if rng.rand_range(0..2) == 0 {
                        #[expect(clippy::cast_possible_wrap, reason = "bounded by PRIORITY_RANGE")]
                        let p = rng.rand_range(0..PRIORITY_RANGE) as i64;
                        if queue.insert(prio(p), p) {
                            local_inserted.push(p);
                        }
                    } else if let Some((priority, value)) = queue.remove_min() {
                        assert_eq!(priority.get(), value);
                        local_removed.push(value);
                    }
                }

                inserted.lock().unwrap().extend(local_inserted);
                removed.lock().unwrap().extend(local_removed);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut last = i64::MIN;
    let mut remaining = Vec::new();
    while let Some((priority, value)) = queue.remove_min() {
        assert!(priority.get() >= last, "drain order regressed at {}", priority.get());
        last = priority.get();
        remaining.push(value);
    }

    let mut all_removed = removed.lock().unwrap().clone();
    all_removed.extend(remaining);
    all_removed.sort_unstable();

    let mut all_inserted = inserted.lock().unwrap().clone();
    all_inserted.sort_unstable();

    assert_eq!(all_removed, all_inserted);
}
