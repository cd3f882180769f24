//! Counter wraparound acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A 32-bit wrap between two reads yields the true small delta
//! - Reads before bring-up return zero
//! - One second of ticks converts to exactly one second

use super::common::{bring_up, bring_up_with, TICKS_PER_SEC};
use std::sync::Arc;
use synctimer_clock::{
    ClockSource, ClockSourceInfo, CounterSource, MonotonicClock, PersistentClock, Scale,
    SimulatedCounter, TimeRegistry,
};
use synctimer_common::config::ClockConfig;
use synctimer_common::time::Timespec;

const SCALE: Scale = Scale::new(4_000_000_000, 17);

#[test]
fn test_raw_wrap_gives_small_delta() {
    let counter = Arc::new(SimulatedCounter::new(0xFFFF_FFFB));
    let monotonic = MonotonicClock::new(Arc::clone(&counter), SCALE, u32::MAX, TICKS_PER_SEC);
    let persistent = PersistentClock::new(Arc::clone(&counter), SCALE, u32::MAX, Timespec::ZERO);
    monotonic.init();

    counter.set(0x0000_0003);

    assert_eq!(monotonic.accumulator().delta(0xFFFF_FFFB, 0x0000_0003), 8);
    assert_eq!(monotonic.now_ns(), 8 * 30_517_578_125 / 1_000_000);
    assert_eq!(persistent.read_with_delta().delta_cycles, 8);
}

#[test]
fn test_offset_adjusted_wrap_is_transparent() {
    let tc = bring_up(0x1000, Timespec::new(50, 0)).unwrap();

    // Walk the adjusted counter up to just below its own wrap
    let step = 1u32 << 30;
    for _ in 0..3 {
        tc.counter.advance(step);
        tc.clocks.monotonic().update();
        tc.registry.read_persistent_clock();
    }
    tc.counter.advance(step - 5);
    assert_eq!(tc.clocks.clocksource().read(), u32::MAX - 4);
    let before = tc.registry.sched_clock();
    let persisted = tc.registry.read_persistent_clock();

    tc.counter.advance(8);
    assert_eq!(tc.clocks.clocksource().read(), 3);

    let after = tc.registry.sched_clock();
    assert!(after > before);
    assert!(after - before <= SCALE.cycles_to_ns(8) + 1);
    assert!(tc.registry.read_persistent_clock() > persisted);
}

#[test]
fn test_zero_before_bring_up() {
    let registry = TimeRegistry::new();
    assert_eq!(registry.sched_clock(), 0);
    assert_eq!(registry.read_persistent_clock(), Timespec::ZERO);

    let counter = Arc::new(SimulatedCounter::new(0xDEAD_BEEF));
    let info = ClockSourceInfo::from_config(&ClockConfig::default()).unwrap();
    let source = ClockSource::new(info, counter.clone());
    assert_eq!(source.read(), 0);

    let monotonic = MonotonicClock::new(Arc::clone(&counter), SCALE, u32::MAX, TICKS_PER_SEC);
    counter.advance(TICKS_PER_SEC);
    assert_eq!(monotonic.now_ns(), 0);
}

#[test]
fn test_one_second_of_ticks() {
    let tc = bring_up(12_345, Timespec::new(7, 0)).unwrap();
    let t0 = tc.registry.sched_clock();
    let p0 = tc.registry.read_persistent_clock();

    tc.counter.advance(TICKS_PER_SEC);

    assert_eq!(tc.registry.sched_clock() - t0, 1_000_000_000);
    let p1 = tc.registry.read_persistent_clock();
    assert_eq!(p1.as_nanos() - p0.as_nanos(), 1_000_000_000);
    assert_eq!(p1, Timespec::new(8, 0));
}

#[test]
fn test_narrow_counter_wraps_at_its_mask() {
    let config = ClockConfig {
        counter_bits: 16,
        update_interval: Some(std::time::Duration::from_secs(1)),
        ..ClockConfig::default()
    };
    let tc = bring_up_with(&config, 0, Timespec::ZERO).unwrap();
    assert_eq!(tc.clocks.clocksource().info().mask, 0xFFFF);

    // 16-bit counter wraps every two seconds; re-base every second
    for _ in 0..10 {
        tc.counter.advance(TICKS_PER_SEC);
        tc.clocks.monotonic().update();
        tc.registry.read_persistent_clock();
    }
    assert_eq!(tc.registry.sched_clock(), 10_000_000_000);
    assert_eq!(tc.registry.read_persistent_clock(), Timespec::new(10, 0));
}
