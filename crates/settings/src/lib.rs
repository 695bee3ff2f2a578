//! # Settings
//!
//! The persisted settings record (steps/mm, pulse width, acceleration,
//! junction deviation, ...), its CRC-8-protected non-volatile encoding, and
//! the `$n=v` console edit protocol, grounded directly in the upstream
//! firmware's `settings.c`.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod crc;
pub mod error;
pub mod record;

pub use error::{SettingsError, StoreFault};
pub use record::{SettingsRecord, SETTINGS_SIGNATURE};

/// Parses a `$n=v` or `$n` line's body (the text *after* the leading `$`),
/// returning `None` for the bare `$` dump request.
///
/// Mirrors `settings_execute_line`'s hand-rolled float reader: only a
/// leading sign, digits, and an optional single decimal point are accepted
/// (no scientific notation), matching the distilled spec's ban on it.
pub fn parse_edit_line(body: &str) -> Result<Option<(u32, f32)>, SettingsError> {
    if body.is_empty() {
        return Ok(None);
    }
    let (param_str, rest) = split_at_equals(body).ok_or(SettingsError::UnsupportedStatement)?;
    let parameter: u32 = param_str.parse().map_err(|_| SettingsError::BadNumberFormat)?;
    let value: f32 = parse_decimal(rest).ok_or(SettingsError::BadNumberFormat)?;
    Ok(Some((parameter, value)))
}

fn split_at_equals(body: &str) -> Option<(&str, &str)> {
    let index = body.find('=')?;
    Some((&body[..index], &body[index + 1..]))
}

fn parse_decimal(text: &str) -> Option<f32> {
    if text.is_empty() || text.contains(['e', 'E']) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dollar_requests_a_dump() {
        assert_eq!(parse_edit_line(""), Ok(None));
    }

    #[test]
    fn parameter_assignment_parses() {
        assert_eq!(parse_edit_line("4=374.3"), Ok(Some((4, 374.3))));
    }

    #[test]
    fn missing_equals_is_unsupported() {
        assert_eq!(parse_edit_line("4374.3"), Err(SettingsError::UnsupportedStatement));
    }

    #[test]
    fn scientific_notation_is_rejected() {
        assert_eq!(parse_edit_line("4=3.7e2"), Err(SettingsError::BadNumberFormat));
    }

    #[test]
    fn non_numeric_parameter_is_bad_format() {
        assert_eq!(parse_edit_line("x=1.0"), Err(SettingsError::BadNumberFormat));
    }
}
