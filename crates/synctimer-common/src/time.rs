//! Calendar-like timestamp arithmetic without division.
//!
//! [`Timespec`] is the value returned by the persistent clock. Adding a
//! nanosecond delta carries whole seconds out of the nanosecond field using
//! shift-and-subtract, so the hot path never issues an integer divide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Nanoseconds per second.
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NSEC_PER_MSEC: u64 = 1_000_000;

/// Largest power-of-two multiple of [`NSEC_PER_SEC`] that fits in a `u64`.
const MAX_SEC_SHIFT: u32 = 34;

/// Seconds/nanoseconds pair, always normalized so `nsec < NSEC_PER_SEC`.
///
/// Fields are private so every value goes through [`Timespec::new`];
/// deserialized values are normalized the same way.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "RawTimespec")]
pub struct Timespec {
    /// Whole seconds.
    sec: u64,
    /// Nanoseconds within the second.
    nsec: u32,
}

/// Wire form of [`Timespec`], accepted un-normalized.
#[derive(Deserialize)]
struct RawTimespec {
    sec: u64,
    nsec: u64,
}

impl From<RawTimespec> for Timespec {
    fn from(raw: RawTimespec) -> Self {
        Self::new(raw.sec, raw.nsec)
    }
}

impl Timespec {
    /// The zero timestamp.
    pub const ZERO: Self = Self { sec: 0, nsec: 0 };

    /// Create a timestamp, carrying any excess nanoseconds into seconds.
    #[must_use]
    pub fn new(sec: u64, nsec: u64) -> Self {
        let (carry, nsec) = split_ns(nsec);
        Self {
            sec: sec.saturating_add(carry),
            nsec,
        }
    }

    /// Whole seconds.
    #[must_use]
    pub const fn sec(&self) -> u64 {
        self.sec
    }

    /// Nanoseconds within the second, always below [`NSEC_PER_SEC`].
    #[must_use]
    pub const fn nsec(&self) -> u32 {
        self.nsec
    }

    /// Add a nanosecond delta in place.
    ///
    /// Seconds saturate at `u64::MAX` rather than wrapping.
    pub fn add_ns(&mut self, ns: u64) {
        let (secs, rem) = split_ns(ns);
        // Both terms are below NSEC_PER_SEC, so the sum fits in u64.
        let (carry, nsec) = split_ns(u64::from(self.nsec) + u64::from(rem));
        self.sec = self.sec.saturating_add(secs).saturating_add(carry);
        self.nsec = nsec;
    }

    /// Return a copy advanced by `ns` nanoseconds.
    #[must_use]
    pub fn plus_ns(mut self, ns: u64) -> Self {
        self.add_ns(ns);
        self
    }

    /// Total nanoseconds represented.
    #[must_use]
    pub fn as_nanos(&self) -> u128 {
        u128::from(self.sec) * u128::from(NSEC_PER_SEC) + u128::from(self.nsec)
    }
}

/// Split nanoseconds into `(seconds, remaining nanoseconds)`.
///
/// Binary long division by [`NSEC_PER_SEC`]: at most 35 compare/subtract steps.
fn split_ns(mut ns: u64) -> (u64, u32) {
    let mut secs = 0u64;
    for shift in (0..=MAX_SEC_SHIFT).rev() {
        let chunk = NSEC_PER_SEC << shift;
        if ns >= chunk {
            ns -= chunk;
            secs |= 1 << shift;
        }
    }
    // ns < NSEC_PER_SEC here
    (secs, ns as u32)
}

impl From<Duration> for Timespec {
    fn from(d: Duration) -> Self {
        Self {
            sec: d.as_secs(),
            nsec: d.subsec_nanos(),
        }
    }
}

impl From<Timespec> for Duration {
    fn from(ts: Timespec) -> Self {
        Duration::new(ts.sec, ts.nsec)
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
