//! Console-facing error kinds, `Display`-formatted to the exact strings the
//! upstream firmware's `status_message` prints.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum GCodeError {
    #[cfg_attr(feature = "std", error("Bad number format"))]
    BadNumberFormat,
    #[cfg_attr(feature = "std", error("Expected command letter"))]
    ExpectedCommandLetter,
    #[cfg_attr(feature = "std", error("Unsupported statement"))]
    UnsupportedStatement,
    #[cfg_attr(feature = "std", error("Floating point error"))]
    FloatingPointError,
    #[cfg_attr(feature = "std", error("Modal group violation"))]
    ModalGroupViolation,
    #[cfg_attr(feature = "std", error("Invalid command"))]
    InvalidCommand,
}

#[cfg(not(feature = "std"))]
impl fmt::Display for GCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            GCodeError::BadNumberFormat => "Bad number format",
            GCodeError::ExpectedCommandLetter => "Expected command letter",
            GCodeError::UnsupportedStatement => "Unsupported statement",
            GCodeError::FloatingPointError => "Floating point error",
            GCodeError::ModalGroupViolation => "Modal group violation",
            GCodeError::InvalidCommand => "Invalid command",
        };
        f.write_str(message)
    }
}
