//! Raw counter sources.
//!
//! A [`CounterSource`] is the only thing the clocks need from hardware: a
//! free-running 32-bit value that increments at a fixed frequency and wraps
//! modulo 2^32. Reads must be cheap and safe from any context.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Free-running counter read capability.
pub trait CounterSource: Send + Sync {
    /// Read the current raw counter value.
    fn read(&self) -> u32;
}

/// Type-erased, shareable counter used once a hardware variant is selected.
pub type SharedCounter = Arc<dyn CounterSource>;

impl<T: CounterSource + ?Sized> CounterSource for Arc<T> {
    #[inline]
    fn read(&self) -> u32 {
        (**self).read()
    }
}

impl<T: CounterSource + ?Sized> CounterSource for &T {
    #[inline]
    fn read(&self) -> u32 {
        (**self).read()
    }
}

impl<T: CounterSource + ?Sized> CounterSource for Box<T> {
    #[inline]
    fn read(&self) -> u32 {
        (**self).read()
    }
}

/// Software counter for testing without hardware.
///
/// The value only moves when told to, which makes wraparound and
/// interleaving scenarios reproducible.
#[derive(Debug, Default)]
pub struct SimulatedCounter {
    value: AtomicU32,
}

impl SimulatedCounter {
    /// Create a counter starting at `start`.
    #[must_use]
    pub fn new(start: u32) -> Self {
        Self {
            value: AtomicU32::new(start),
        }
    }

    /// Set the raw value.
    pub fn set(&self, value: u32) {
        self.value.store(value, Ordering::Release);
    }

    /// Advance by `ticks`, wrapping at 2^32. Returns the new value.
    pub fn advance(&self, ticks: u32) -> u32 {
        self.value
            .fetch_add(ticks, Ordering::AcqRel)
            .wrapping_add(ticks)
    }
}

impl CounterSource for SimulatedCounter {
    #[inline]
    fn read(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}
