//! Concurrency acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Concurrent persistent-clock readers consume disjoint cycle slices:
//!   the deltas they observe sum to exactly the ticks that elapsed
//! - Each reader sees non-decreasing persistent timestamps
//! - Scheduler clock reads racing a periodic updater stay consistent

use super::common::{bring_up, TICKS_PER_SEC};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use synctimer_clock::CounterSource;
use synctimer_common::time::Timespec;

const READERS: usize = 8;
const ADVANCES: u32 = 20_000;

#[test]
fn test_concurrent_persistent_reads_account_every_tick() {
    let boot = Timespec::new(1_000, 0);
    let tc = bring_up(0x7fff_0000, boot).unwrap();
    let persistent = tc.clocks.persistent();
    let done = AtomicBool::new(false);

    let consumed: u64 = thread::scope(|s| {
        let done = &done;
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                s.spawn(move || {
                    let mut sum = 0u64;
                    let mut last = Timespec::ZERO;
                    while !done.load(Ordering::Acquire) {
                        let reading = persistent.read_with_delta();
                        assert!(reading.timestamp >= last, "persistent clock went backwards");
                        last = reading.timestamp;
                        sum += u64::from(reading.delta_cycles);
                    }
                    sum
                })
            })
            .collect();

        for i in 0..ADVANCES {
            tc.counter.advance(1 + i % 7);
            if i % 64 == 0 {
                thread::yield_now();
            }
        }
        done.store(true, Ordering::Release);

        readers.into_iter().map(|h| h.join().unwrap()).sum()
    });

    // Pick up whatever the readers left behind
    let tail = persistent.read_with_delta();
    let total = consumed + u64::from(tail.delta_cycles);

    let expected: u64 = (0..ADVANCES).map(|i| u64::from(1 + i % 7)).sum();
    assert_eq!(total, expected);
    assert_eq!(u64::from(tc.clocks.clocksource().read()), expected);

    // Per-read truncation can only lose time, never invent it
    let exact_ns = expected * 1_000_000_000 / u64::from(TICKS_PER_SEC);
    assert!(tail.timestamp.as_nanos() <= boot.as_nanos() + u128::from(exact_ns));
    assert!(tail.timestamp > boot);
}

#[test]
fn test_sched_clock_reads_race_updates() {
    let tc = bring_up(0, Timespec::ZERO).unwrap();
    let monotonic = tc.clocks.monotonic();
    let registry = &tc.registry;
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let mut last = 0u64;
                while !done.load(Ordering::Acquire) {
                    let now = registry.sched_clock();
                    assert!(now >= last, "sched_clock went backwards: {now} < {last}");
                    last = now;
                }
            });
        }

        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                monotonic.update();
                thread::yield_now();
            }
        });

        for _ in 0..ADVANCES {
            tc.counter.advance(TICKS_PER_SEC / 8);
        }
        done.store(true, Ordering::Release);
    });

    let expected = u64::from(ADVANCES) * 125_000_000;
    assert_eq!(registry.sched_clock(), expected);
}
