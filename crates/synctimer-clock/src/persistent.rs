//! Persistent clock built on the always-on counter.
//!
//! The counter keeps running while higher-resolution timers are powered
//! down, so it can carry absolute time across those periods. Every
//! [`PersistentClock::read`] converts the cycles elapsed since the previous
//! read and adds them to a stored [`Timespec`].
//!
//! Reads are serialized by a spin lock: each caller consumes a unique,
//! non-overlapping slice of counter cycles, so concurrent callers neither
//! lose nor double-count ticks. As with the scheduler clock, at least one
//! read must happen per counter wrap period or whole wraps go missing.

use crate::scale::Scale;
use crate::source::CounterSource;
use spin::Mutex;
use synctimer_common::time::Timespec;
use tracing::{debug, trace};

/// State owned by the persistent clock and mutated only under its lock.
#[derive(Debug, Clone, Copy)]
struct PersistentState {
    timestamp: Timespec,
    last_cycles: u32,
}

/// Result of one persistent-clock read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentReading {
    /// Timestamp after accounting for the consumed cycles.
    pub timestamp: Timespec,
    /// Counter cycles consumed by this read.
    pub delta_cycles: u32,
}

/// Absolute timestamp accumulated from counter deltas.
#[derive(Debug)]
pub struct PersistentClock<S> {
    source: S,
    scale: Scale,
    mask: u32,
    state: Mutex<PersistentState>,
}

impl<S: CounterSource> PersistentClock<S> {
    /// Seed the clock with `boot_time`, anchored at the current counter value.
    pub fn new(source: S, scale: Scale, mask: u32, boot_time: Timespec) -> Self {
        let last_cycles = source.read();
        debug!(%boot_time, last_cycles, "Persistent clock seeded");
        Self {
            source,
            scale,
            mask,
            state: Mutex::new(PersistentState {
                timestamp: boot_time,
                last_cycles,
            }),
        }
    }

    /// Current persistent time.
    pub fn read(&self) -> Timespec {
        self.read_with_delta().timestamp
    }

    /// Current persistent time together with the cycles this call consumed.
    pub fn read_with_delta(&self) -> PersistentReading {
        let mut state = self.state.lock();
        let cycles = self.source.read();
        let delta_cycles = cycles.wrapping_sub(state.last_cycles) & self.mask;
        state.timestamp.add_ns(self.scale.cycles_to_ns(delta_cycles));
        state.last_cycles = cycles;
        let timestamp = state.timestamp;
        drop(state);

        trace!(delta_cycles, %timestamp, "Persistent clock read");
        PersistentReading {
            timestamp,
            delta_cycles,
        }
    }

    /// Last timestamp handed out, without sampling the counter.
    pub fn last(&self) -> Timespec {
        self.state.lock().timestamp
    }

    /// Conversion constants.
    pub fn scale(&self) -> Scale {
        self.scale
    }
}
