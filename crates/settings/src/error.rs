//! Error types surfaced by the settings store and the `$n=v` edit protocol.

use core::fmt;

/// A `$n=v` line was rejected; the in-memory record and the NVS copy are
/// left untouched.
///
/// Derives `thiserror::Error` under `std` so callers get a real
/// `std::error::Error` impl for free; `no_std` builds fall back to a manual
/// `Display` below since `thiserror` itself needs an allocator-backed `std`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum SettingsError {
    /// `read_float` failed to parse the parameter index or the value.
    #[cfg_attr(feature = "std", error("Bad number format"))]
    BadNumberFormat,
    /// The line didn't match `$`, `$n`, or `$n=v`.
    #[cfg_attr(feature = "std", error("Unsupported statement"))]
    UnsupportedStatement,
    /// `n` is not one of the known parameter indices `0..=8`.
    #[cfg_attr(feature = "std", error("Unknown parameter"))]
    UnknownParameter,
    /// Steps/mm (`$0`-`$2`) was not strictly positive.
    #[cfg_attr(feature = "std", error("Steps/mm must be > 0.0"))]
    StepsPerMmMustBePositive,
    /// Step pulse width (`$3`) was below the minimum the driver can emit.
    #[cfg_attr(feature = "std", error("Step pulse must be >= 3 microseconds"))]
    StepPulseTooShort,
}

#[cfg(not(feature = "std"))]
impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SettingsError::BadNumberFormat => "Bad number format",
            SettingsError::UnsupportedStatement => "Unsupported statement",
            SettingsError::UnknownParameter => "Unknown parameter",
            SettingsError::StepsPerMmMustBePositive => "Steps/mm must be > 0.0",
            SettingsError::StepPulseTooShort => "Step pulse must be >= 3 microseconds",
        };
        f.write_str(message)
    }
}

/// The non-volatile store held a record that failed the signature or CRC
/// check; the caller should fall back to [`crate::SettingsRecord::default`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum StoreFault {
    #[cfg_attr(feature = "std", error("settings signature mismatch"))]
    SignatureMismatch,
    #[cfg_attr(feature = "std", error("settings checksum mismatch"))]
    ChecksumMismatch,
    /// The underlying HAL storage reported an error fetching or storing the
    /// record.
    #[cfg_attr(feature = "std", error("non-volatile storage error"))]
    Io,
}

#[cfg(not(feature = "std"))]
impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            StoreFault::SignatureMismatch => "settings signature mismatch",
            StoreFault::ChecksumMismatch => "settings checksum mismatch",
            StoreFault::Io => "non-volatile storage error",
        };
        f.write_str(message)
    }
}
