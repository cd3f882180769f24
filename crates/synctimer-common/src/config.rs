//! Configuration structures for the 32k sync-counter clock.
//!
//! Supports TOML deserialization with defaults matching a 32768 Hz,
//! 32-bit free-running counter.

use crate::error::{ClockError, ClockResult};
use crate::time::NSEC_PER_SEC;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Multiplier that converts 32768 Hz ticks to nanoseconds with [`DEFAULT_SHIFT`].
pub const DEFAULT_MULT: u32 = 4_000_000_000;

/// Shift paired with [`DEFAULT_MULT`].
pub const DEFAULT_SHIFT: u32 = 17;

/// Top-level clock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Clocksource name reported at registration.
    pub name: String,

    /// Clocksource rating (higher is preferred by the time subsystem).
    pub rating: u32,

    /// Counter frequency in Hz.
    pub frequency_hz: u32,

    /// Counter width in bits (1..=32).
    pub counter_bits: u32,

    /// Conversion range used when deriving multiply/shift constants.
    #[serde(with = "humantime_serde")]
    pub max_conversion: Duration,

    /// Fixed multiply/shift constants. When absent they are derived.
    pub scale: Option<FixedScale>,

    /// Period of the re-basing update. Defaults to 90% of the wrap period.
    #[serde(with = "humantime_serde::option")]
    pub update_interval: Option<Duration>,

    /// Interface clock gated on before the first counter read.
    pub interface_clock: Option<String>,

    /// SoC family backing the counter register.
    pub variant: Option<SocVariant>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            name: String::from("32k_counter"),
            rating: 250,
            frequency_hz: 32_768,
            counter_bits: 32,
            max_conversion: Duration::from_secs(60),
            scale: Some(FixedScale {
                mult: DEFAULT_MULT,
                shift: DEFAULT_SHIFT,
            }),
            update_interval: None,
            interface_clock: Some(String::from("omap_32ksync_ick")),
            variant: None,
        }
    }
}

/// Explicit multiply/shift pair: `ns = (cycles * mult) >> shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedScale {
    /// Multiplier.
    pub mult: u32,
    /// Right shift applied after the multiply.
    pub shift: u32,
}

/// SoC family that provides the 32k sync counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SocVariant {
    /// OMAP16xx, counter at a fixed absolute address.
    Omap16xx,
    /// OMAP2420.
    Omap2420,
    /// OMAP2430.
    Omap2430,
    /// OMAP34xx / OMAP3630.
    Omap34xx,
    /// OMAP44xx.
    Omap44xx,
    /// Any family without a known counter register (e.g. OMAP730, OMAP1510).
    Unsupported(String),
}

impl SocVariant {
    /// Short lowercase name used in configuration files.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Omap16xx => "omap16xx",
            Self::Omap2420 => "omap2420",
            Self::Omap2430 => "omap2430",
            Self::Omap34xx => "omap34xx",
            Self::Omap44xx => "omap44xx",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<String> for SocVariant {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "omap16xx" => Self::Omap16xx,
            "omap2420" => Self::Omap2420,
            "omap2430" => Self::Omap2430,
            "omap34xx" | "omap3430" | "omap3630" => Self::Omap34xx,
            "omap44xx" | "omap4430" => Self::Omap44xx,
            _ => Self::Unsupported(name),
        }
    }
}

impl From<SocVariant> for String {
    fn from(variant: SocVariant) -> Self {
        variant.name().to_string()
    }
}

impl fmt::Display for SocVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ClockConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        debug!(?path, "Loading clock configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Bit mask selecting the valid counter bits.
    #[must_use]
    pub fn mask(&self) -> u32 {
        u32::MAX
            .checked_shr(32u32.saturating_sub(self.counter_bits))
            .unwrap_or(0)
    }

    /// Time for the counter to cycle through every value once.
    ///
    /// Computed exactly from the frequency; the fixed-point wrap period
    /// reported by the clock may differ by the conversion rounding.
    #[must_use]
    pub fn counter_wrap_period(&self) -> Duration {
        if self.frequency_hz == 0 {
            return Duration::ZERO;
        }
        let ticks = u128::from(self.mask()) + 1;
        let ns = ticks * u128::from(NSEC_PER_SEC) / u128::from(self.frequency_hz);
        Duration::from_nanos(u64::try_from(ns).unwrap_or(u64::MAX))
    }

    /// Check that the configuration describes a usable counter.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Config`] describing the first invalid field.
    pub fn validate(&self) -> ClockResult<()> {
        if self.frequency_hz == 0 {
            return Err(ClockError::Config("frequency_hz must be non-zero".into()));
        }
        if !(1..=32).contains(&self.counter_bits) {
            return Err(ClockError::Config(format!(
                "counter_bits must be in 1..=32, got {}",
                self.counter_bits
            )));
        }
        if self.max_conversion.as_secs() == 0 {
            return Err(ClockError::Config(
                "max_conversion must be at least one second".into(),
            ));
        }
        if let Some(scale) = self.scale {
            if scale.mult == 0 || scale.shift == 0 || scale.shift > 32 {
                return Err(ClockError::Config(format!(
                    "invalid fixed scale {}>>{}",
                    scale.mult, scale.shift
                )));
            }
        }
        let wrap = self.counter_wrap_period();
        if wrap.saturating_sub(wrap / 10).is_zero() {
            return Err(ClockError::Config(format!(
                "a {}-bit counter at {} Hz wraps too fast to re-base",
                self.counter_bits, self.frequency_hz
            )));
        }
        if let Some(interval) = self.update_interval {
            if interval.is_zero() || interval >= wrap {
                return Err(ClockError::Config(format!(
                    "update_interval {} must be non-zero and shorter than the wrap period {}",
                    humantime::format_duration(interval),
                    humantime::format_duration(wrap)
                )));
            }
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Same format for optional durations; `None` is omitted.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
