//! Error types for the motion planning crate.

use core::fmt;

/// Represents errors that can occur during motion planning.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlannerError {
    /// The block buffer is full; the caller should retry after yielding to
    /// the runtime dispatcher.
    BufferFull,
    /// `steps_per_mm` was zero or negative for some axis.
    InvalidStepsPerMm,
    /// `acceleration` was zero or negative.
    InvalidAcceleration,
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PlannerError::BufferFull => "block buffer is full",
            PlannerError::InvalidStepsPerMm => "steps/mm must be greater than zero",
            PlannerError::InvalidAcceleration => "acceleration must be greater than zero",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}
