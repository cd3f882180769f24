//! Clocksource descriptor for the 32k counter.
//!
//! Wraps the selected raw register with the metadata a time subsystem
//! registers (name, rating, mask, frequency) and with the boot offset:
//! once enabled, reads count from the moment of enablement. Before that,
//! reads return `0` so that very early callers get a harmless value.

use crate::scale::Scale;
use crate::source::{CounterSource, SharedCounter};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use synctimer_common::config::ClockConfig;
use synctimer_common::error::ClockResult;
use tracing::debug;

/// Registration metadata for a counter-backed clocksource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSourceInfo {
    /// Clocksource name.
    pub name: String,
    /// Preference rating.
    pub rating: u32,
    /// Valid counter bits.
    pub mask: u32,
    /// Counter frequency in Hz.
    pub frequency_hz: u32,
    /// Conversion constants for the registered range.
    pub scale: Scale,
    /// The counter keeps running in every power state.
    pub continuous: bool,
}

impl ClockSourceInfo {
    /// Build registration metadata from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the frequency is zero.
    pub fn from_config(config: &ClockConfig) -> ClockResult<Self> {
        let mask = config.mask();
        Ok(Self {
            name: config.name.clone(),
            rating: config.rating,
            mask,
            frequency_hz: config.frequency_hz,
            scale: Scale::for_clocksource(config.frequency_hz, mask)?,
            continuous: true,
        })
    }
}

/// Offset-adjusted counter with a dummy read before enablement.
pub struct ClockSource {
    info: ClockSourceInfo,
    raw: SharedCounter,
    offset: AtomicU32,
    enabled: AtomicBool,
}

impl fmt::Debug for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSource")
            .field("info", &self.info)
            .field("offset", &self.offset.load(Ordering::Relaxed))
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ClockSource {
    /// Create a disabled clocksource over `raw`.
    pub fn new(info: ClockSourceInfo, raw: SharedCounter) -> Self {
        Self {
            info,
            raw,
            offset: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    /// Capture the current raw value as the boot offset and start reading
    /// through to the register. Returns the offset.
    pub fn enable(&self) -> u32 {
        let offset = self.raw.read();
        self.offset.store(offset, Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
        debug!(name = %self.info.name, offset, "Clocksource enabled");
        offset
    }

    /// Whether [`enable`](Self::enable) has run.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Raw value captured at enablement.
    pub fn offset(&self) -> u32 {
        self.offset.load(Ordering::Relaxed)
    }

    /// Registration metadata.
    pub fn info(&self) -> &ClockSourceInfo {
        &self.info
    }

    /// Read the register without applying the offset.
    pub fn read_raw(&self) -> u32 {
        self.raw.read()
    }
}

impl CounterSource for ClockSource {
    #[inline]
    fn read(&self) -> u32 {
        if !self.enabled.load(Ordering::Acquire) {
            return 0;
        }
        self.raw.read().wrapping_sub(self.offset.load(Ordering::Relaxed)) & self.info.mask
    }
}
