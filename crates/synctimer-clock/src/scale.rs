//! Fixed-point cycle to nanosecond conversion.
//!
//! A [`Scale`] approximates `cycles * 1e9 / F` as `(cycles * mult) >> shift`.
//! The pair is derived once, at bring-up; after that every conversion is a
//! single 64-bit multiply and shift with no division and no floating point.
//!
//! Counter deltas and multipliers are both `u32`, so the product always fits
//! in the 64-bit working width regardless of how far the counter advanced.

use static_assertions::const_assert;
use synctimer_common::config::FixedScale;
use synctimer_common::error::{ClockError, ClockResult};
use synctimer_common::time::NSEC_PER_SEC;

/// Largest shift a scale may use; keeps the carried remainder below `2^32`.
pub const MAX_SHIFT: u32 = 32;

// u32 delta * u32 mult, plus a remainder below 2^MAX_SHIFT, never overflows u64.
const_assert!(
    (u32::MAX as u128) * (u32::MAX as u128) + (1u128 << MAX_SHIFT) <= u64::MAX as u128
);

/// Upper bound on the conversion range a clocksource registration asks for.
const MAX_CLOCKSOURCE_SECS: u64 = 600;

/// Multiply/shift pair converting counter cycles to nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    mult: u32,
    shift: u32,
}

impl Scale {
    /// Create a scale from explicit constants.
    ///
    /// `shift` must not exceed [`MAX_SHIFT`]; configuration-supplied pairs
    /// should go through [`Scale::checked`].
    #[must_use]
    pub const fn new(mult: u32, shift: u32) -> Self {
        debug_assert!(shift <= MAX_SHIFT, "scale shift out of range");
        Self { mult, shift }
    }

    /// Create a scale, rejecting a zero multiplier or an out-of-range shift.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] for an unusable pair.
    pub fn checked(mult: u32, shift: u32) -> ClockResult<Self> {
        if mult == 0 || shift == 0 || shift > MAX_SHIFT {
            return Err(ClockError::Config(format!(
                "invalid scale {mult}>>{shift}"
            )));
        }
        Ok(Self::new(mult, shift))
    }

    /// Multiplier.
    #[must_use]
    pub const fn mult(&self) -> u32 {
        self.mult
    }

    /// Right shift applied after the multiply.
    #[must_use]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Derive the most precise pair converting `from` Hz to `to` Hz that
    /// stays exact enough over `max_secs` seconds of input.
    ///
    /// The shift is chosen as large as possible while keeping `mult` within
    /// the bits left over after accounting for `max_secs * from` cycles.
    /// This divides, so it belongs at configuration time only.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] if `from` is zero.
    pub fn calculate(from: u32, to: u32, max_secs: u32) -> ClockResult<Self> {
        if from == 0 {
            return Err(ClockError::Config(
                "cannot derive a scale for a 0 Hz counter".into(),
            ));
        }

        // Bits consumed by the largest input we promise to convert.
        let mut tmp = (u64::from(max_secs) * u64::from(from)) >> 32;
        let mut sftacc = 32u32;
        while tmp != 0 {
            tmp >>= 1;
            sftacc = sftacc.saturating_sub(1);
        }

        let mut sft = 32u32;
        let mut mult = 0u64;
        while sft > 0 {
            mult = ((u64::from(to) << sft) + u64::from(from / 2)) / u64::from(from);
            if mult >> sftacc == 0 {
                break;
            }
            sft -= 1;
        }

        Ok(Self {
            mult: u32::try_from(mult).unwrap_or(u32::MAX),
            shift: sft,
        })
    }

    /// Derive a nanosecond scale for a counter of frequency `hz` over
    /// `max_secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] if `hz` is zero.
    pub fn for_frequency(hz: u32, max_secs: u32) -> ClockResult<Self> {
        Self::calculate(hz, NSEC_PER_SEC as u32, max_secs)
    }

    /// Derive the scale a clocksource registration would use.
    ///
    /// The conversion range is a fifth of the counter wrap time, clamped to
    /// between one second and ten minutes.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] if `hz` is zero.
    pub fn for_clocksource(hz: u32, mask: u32) -> ClockResult<Self> {
        if hz == 0 {
            return Err(ClockError::Config(
                "cannot register a 0 Hz clocksource".into(),
            ));
        }
        let secs = (u64::from(mask) / u64::from(hz) / 5).clamp(1, MAX_CLOCKSOURCE_SECS);
        Self::for_frequency(hz, secs as u32)
    }

    /// Accept fixed constants only if they match the derived pair for `hz`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ScaleMismatch`] when the fixed pair differs from
    /// the derived one, or [`ClockError::Config`] if `hz` is zero.
    pub fn verified(fixed: FixedScale, hz: u32, max_secs: u32) -> ClockResult<Self> {
        let derived = Self::for_frequency(hz, max_secs)?;
        if derived.mult != fixed.mult || derived.shift != fixed.shift {
            return Err(ClockError::ScaleMismatch {
                mult: fixed.mult,
                shift: fixed.shift,
                expected_mult: derived.mult,
                expected_shift: derived.shift,
            });
        }
        Self::checked(fixed.mult, fixed.shift)
    }

    /// Convert a cycle delta to nanoseconds.
    #[inline]
    #[must_use]
    pub const fn cycles_to_ns(&self, cycles: u32) -> u64 {
        (cycles as u64 * self.mult as u64) >> self.shift
    }

    /// Convert a cycle delta to nanoseconds, carrying sub-nanosecond bits.
    ///
    /// `frac` is the remainder left over by the previous conversion, in units
    /// of `2^-shift` ns, and must be below `2^shift`, which any remainder this
    /// method returned already is. Returns whole nanoseconds and the new
    /// remainder.
    /// Chaining conversions this way never loses time to truncation.
    #[inline]
    #[must_use]
    pub const fn cycles_to_ns_frac(&self, cycles: u32, frac: u64) -> (u64, u64) {
        // frac < 2^shift, so this stays within u64 (see the const_assert above)
        let scaled = cycles as u64 * self.mult as u64 + frac;
        let frac_mask = (1u64 << self.shift) - 1;
        (scaled >> self.shift, scaled & frac_mask)
    }

    /// Nanoseconds represented by a single cycle.
    #[must_use]
    pub const fn resolution_ns(&self) -> u64 {
        self.cycles_to_ns(1)
    }

    /// Nanoseconds the counter takes to cover `mask` cycles.
    #[must_use]
    pub const fn wrap_period_ns(&self, mask: u32) -> u64 {
        self.cycles_to_ns(mask)
    }

    /// Number of cycles closest to `ns` nanoseconds.
    ///
    /// Inverse of [`Scale::cycles_to_ns`]. It divides, so it is meant for
    /// configuration and tests, not for the read path.
    #[must_use]
    pub fn ns_to_cycles(&self, ns: u64) -> u64 {
        if self.mult == 0 {
            return 0;
        }
        let mult = u128::from(self.mult);
        let cycles = ((u128::from(ns) << self.shift) + mult / 2) / mult;
        u64::try_from(cycles).unwrap_or(u64::MAX)
    }
}

impl TryFrom<FixedScale> for Scale {
    type Error = ClockError;

    fn try_from(fixed: FixedScale) -> ClockResult<Self> {
        Self::checked(fixed.mult, fixed.shift)
    }
}

impl From<Scale> for FixedScale {
    fn from(scale: Scale) -> Self {
        FixedScale {
            mult: scale.mult,
            shift: scale.shift,
        }
    }
}
