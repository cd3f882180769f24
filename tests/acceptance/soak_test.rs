//! Long-run stability tests.
//!
//! Simulated soak tests step a counter through days of ticks in virtual
//! time, re-basing at the configured interval. The ignored test runs the
//! real re-basing thread against a fast-moving counter.
//!
//! # Acceptance Criteria
//!
//! - Seven simulated days with default re-basing stay exact to the ns
//! - Persistent time agrees with scheduler time over the same span
//! - The background re-basing thread keeps up with a fast counter

use super::common::{bring_up, bring_up_with, TICKS_PER_SEC};
use std::thread;
use std::time::{Duration, Instant};
use synctimer_common::config::ClockConfig;
use synctimer_common::time::{Timespec, NSEC_PER_SEC};
use tracing::info;

const WEEK_SECS: u64 = 7 * 24 * 3_600;

#[test]
fn test_week_in_virtual_time() {
    let boot = Timespec::new(1_700_000_000, 0);
    let tc = bring_up(0x5555_5555, boot).unwrap();
    let interval_secs = tc.clocks.update_interval().as_secs();
    assert!(interval_secs > 0);

    let mut elapsed_secs = 0u64;
    while elapsed_secs < WEEK_SECS {
        let secs = interval_secs.min(WEEK_SECS - elapsed_secs);
        let ticks = u32::try_from(secs * u64::from(TICKS_PER_SEC)).unwrap();
        tc.counter.advance(ticks);
        tc.clocks.monotonic().update();
        tc.registry.read_persistent_clock();
        elapsed_secs += secs;
    }

    info!(elapsed_secs, "Virtual soak finished");
    assert_eq!(tc.registry.sched_clock(), WEEK_SECS * NSEC_PER_SEC);
    assert_eq!(
        tc.registry.read_persistent_clock(),
        Timespec::new(boot.sec() + WEEK_SECS, 0)
    );
}

#[test]
#[ignore = "Soak test - takes 5 seconds"]
fn test_rebase_thread_keeps_up() {
    let config = ClockConfig {
        update_interval: Some(Duration::from_millis(1)),
        ..ClockConfig::default()
    };
    let tc = bring_up_with(&config, 0, Timespec::ZERO).unwrap();
    let mut timer = tc.clocks.start_rebase_timer().unwrap();

    // A 1/256 wrap per millisecond leaves the timer plenty of slack
    let step = 1u32 << 24;
    let mut advanced = 0u64;
    let mut last = 0u64;
    let end = Instant::now() + Duration::from_secs(5);
    while Instant::now() < end {
        tc.counter.advance(step);
        advanced += u64::from(step);
        let now = tc.registry.sched_clock();
        assert!(now >= last);
        last = now;
        thread::sleep(Duration::from_millis(1));
    }

    timer.stop();
    tc.clocks.monotonic().update();
    info!(rebases = timer.rebase_count(), "Rebase soak finished");

    let expected = advanced * NSEC_PER_SEC / u64::from(TICKS_PER_SEC);
    assert_eq!(tc.registry.sched_clock(), expected);
    assert!(timer.rebase_count() > 0);
}
