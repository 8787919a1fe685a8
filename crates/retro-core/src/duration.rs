//! Duration literal parsing
//!
//! Duration literals are kept as text in the program and converted to
//! milliseconds when evaluated: a bare number is milliseconds, otherwise
//! one of the suffixes `ms`, `s`, `m`, `h` names the unit.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration literal")]
    Empty,

    #[error("invalid duration literal '{0}'")]
    Invalid(String),
}

/// Parse a duration literal into whole milliseconds
pub fn parse_duration_ms(text: &str) -> Result<i64, DurationError> {
    let trimmed = text.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let (number, factor) = if let Some(n) = trimmed.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = trimmed.strip_suffix('s') {
        (n, 1_000.0)
    } else if let Some(n) = trimmed.strip_suffix('m') {
        (n, 60_000.0)
    } else if let Some(n) = trimmed.strip_suffix('h') {
        (n, 3_600_000.0)
    } else {
        (trimmed.as_str(), 1.0)
    };

    let amount: f64 = number
        .trim()
        .parse()
        .map_err(|_| DurationError::Invalid(text.to_string()))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(DurationError::Invalid(text.to_string()));
    }

    Ok((amount * factor).round() as i64)
}
