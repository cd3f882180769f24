use thiserror::Error;

/// Clock error types covering configuration, bring-up, and registration failures.
///
/// Steady-state reads never produce these; they only surface while a clock
/// is being configured or brought up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// Configuration value out of range.
    #[error("configuration error: {0}")]
    Config(String),

    /// No known raw counter register for the running platform variant.
    #[error("no 32k counter source for platform variant {variant}")]
    UnsupportedPlatform {
        /// Name of the detected variant.
        variant: String,
    },

    /// Fixed multiply/shift constants disagree with the derived pair.
    #[error(
        "wrong multiply/shift: {mult}>>{shift} vs calculated {expected_mult}>>{expected_shift}"
    )]
    ScaleMismatch {
        /// Configured multiplier.
        mult: u32,
        /// Configured shift.
        shift: u32,
        /// Multiplier derived from the counter frequency.
        expected_mult: u32,
        /// Shift derived from the counter frequency.
        expected_shift: u32,
    },

    /// The time subsystem refused a registration.
    #[error("registration failed: {0}")]
    Registration(String),

    /// Periodic re-basing timer could not be started.
    #[error("rebase timer error: {0}")]
    Timer(String),
}

/// Convenience type alias for clock operations.
pub type ClockResult<T> = Result<T, ClockError>;
