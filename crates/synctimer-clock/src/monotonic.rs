//! Scheduler clock: nanoseconds since initialization.
//!
//! [`MonotonicClock`] is the lock-free, relative time source used for
//! scheduling and tracing timestamps. It may be queried before bring-up
//! (returning `0`) and is only meant for short-interval duration math:
//! compare two readings with [`MonotonicClock::elapsed_ns`], never as
//! absolute times across unbounded spans.

use crate::accumulator::WrappingAccumulator;
use crate::scale::Scale;
use crate::source::CounterSource;
use std::time::Duration;
use tracing::info;

/// Rates at or above this are reported in MHz rather than kHz.
const MHZ_REPORT_THRESHOLD: u32 = 4_000_000;

/// 90% of the time `scale` takes to cover `mask` counter cycles.
#[must_use]
pub fn default_update_interval(scale: Scale, mask: u32) -> Duration {
    let wrap_ns = scale.wrap_period_ns(mask);
    Duration::from_nanos(wrap_ns - wrap_ns / 10)
}

/// Relative nanosecond clock over a wrapping counter.
#[derive(Debug)]
pub struct MonotonicClock<S> {
    accumulator: WrappingAccumulator<S>,
    frequency_hz: u32,
}

impl<S: CounterSource> MonotonicClock<S> {
    /// Create an uninitialized clock. [`now_ns`](Self::now_ns) returns `0`
    /// until [`init`](Self::init) runs.
    pub fn new(source: S, scale: Scale, mask: u32, frequency_hz: u32) -> Self {
        Self {
            accumulator: WrappingAccumulator::new(source, scale, mask),
            frequency_hz,
        }
    }

    /// Start the clock at `0` ns from the current counter value.
    pub fn init(&self) {
        let rate = if self.frequency_hz >= MHZ_REPORT_THRESHOLD {
            format!("{}MHz", self.frequency_hz / 1_000_000)
        } else {
            format!("{}kHz", self.frequency_hz / 1_000)
        };
        let wrap_ms = self.wrap_period().as_millis();
        info!(
            bits = self.accumulator.mask().count_ones(),
            rate = %rate,
            resolution_ns = self.resolution_ns(),
            wrap_ms,
            "Scheduler clock initialized"
        );
        self.accumulator.init();
    }

    /// Nanoseconds since [`init`](Self::init), or `0` before it.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.accumulator.read_now()
    }

    /// Re-base on the current counter value. Must run at least once per
    /// [`wrap_period`](Self::wrap_period); see [`update_interval`](Self::update_interval).
    pub fn update(&self) -> u64 {
        self.accumulator.update()
    }

    /// Nanoseconds between an earlier reading and now.
    ///
    /// Wrapping subtraction keeps this correct even if the nanosecond value
    /// itself wrapped in between.
    #[inline]
    pub fn elapsed_ns(&self, since: u64) -> u64 {
        self.now_ns().wrapping_sub(since)
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.accumulator.is_initialized()
    }

    /// Nanoseconds per counter tick.
    pub fn resolution_ns(&self) -> u64 {
        self.accumulator.scale().resolution_ns()
    }

    /// Time for the counter to cycle through every value once.
    pub fn wrap_period(&self) -> Duration {
        Duration::from_nanos(
            self.accumulator
                .scale()
                .wrap_period_ns(self.accumulator.mask()),
        )
    }

    /// Recommended re-basing period: 90% of the wrap period.
    ///
    /// Computed in nanoseconds so narrow or fast counters, whose wrap period
    /// is below a millisecond, still get a usable interval.
    pub fn update_interval(&self) -> Duration {
        default_update_interval(self.accumulator.scale(), self.accumulator.mask())
    }

    /// Counter frequency in Hz.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// The underlying accumulator.
    pub fn accumulator(&self) -> &WrappingAccumulator<S> {
        &self.accumulator
    }
}
