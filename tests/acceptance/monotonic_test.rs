//! Scheduler clock monotonicity acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Readings never decrease while the counter advances in arbitrary steps
//! - Re-basing never changes the value a reader would observe
//! - Resolution matches one counter tick

use super::common::{bring_up, TICKS_PER_SEC, TICK_NS};
use synctimer_common::time::Timespec;

#[test]
fn test_never_decreases_under_irregular_steps() {
    let tc = bring_up(0xFFFF_0000, Timespec::ZERO).unwrap();
    let mut last = tc.registry.sched_clock();

    // Deterministic pseudo-random step sizes, some below one tick's worth of ns
    let mut step = 1u32;
    for i in 0..50_000u32 {
        step = step.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        tc.counter.advance(step % 97);
        if i % 1_000 == 0 {
            tc.clocks.monotonic().update();
        }
        let now = tc.registry.sched_clock();
        assert!(now >= last, "step {i}: {now} < {last}");
        last = now;
    }
}

#[test]
fn test_update_is_invisible_to_readers() {
    let tc = bring_up(0, Timespec::ZERO).unwrap();
    let monotonic = tc.clocks.monotonic();

    for ticks in [1u32, 3, 7, 11, 32_767] {
        tc.counter.advance(ticks);
        let before = monotonic.now_ns();
        let rebased = monotonic.update();
        assert_eq!(rebased, before);
        assert_eq!(monotonic.now_ns(), before);
    }
}

#[test]
fn test_resolution_is_one_tick() {
    let tc = bring_up(0, Timespec::ZERO).unwrap();
    let monotonic = tc.clocks.monotonic();
    assert_eq!(monotonic.resolution_ns(), TICK_NS);

    tc.counter.advance(1);
    assert_eq!(monotonic.now_ns(), TICK_NS);
    let start = monotonic.now_ns();
    tc.counter.advance(TICKS_PER_SEC - 1);
    assert_eq!(monotonic.elapsed_ns(start), 1_000_000_000 - TICK_NS);
}
