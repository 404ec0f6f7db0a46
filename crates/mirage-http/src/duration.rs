//! Duration strings used by `ttl` and `delay`.
//!
//! Accepts a sequence of `<number><unit>` terms such as `300ms`, `2s`,
//! `1h30m` or `1.5s`. Units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
//! A bare `0` is the only value allowed without a unit.

use std::time::Duration;
use thiserror::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Fraction digits past this are ignored (they are below nanosecond precision).
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parse a duration string like `2s` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationError::Invalid(input.to_string()));
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let (unit, next) = tail.split_at(unit_len);

        let scale = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        total = total
            .checked_add(term_nanos(number, scale, input)?)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        rest = next;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| DurationError::Overflow(input.to_string()))
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Nanoseconds for one `<number><unit>` term.
fn term_nanos(number: &str, scale: u128, input: &str) -> Result<u128, DurationError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let overflow = || DurationError::Overflow(input.to_string());

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

    if !fraction.is_empty() {
        let mut value: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in fraction.bytes().take(MAX_FRACTION_DIGITS) {
            value = value * 10 + u128::from(digit - b'0');
            divisor *= 10;
        }
        nanos = nanos
            .checked_add(value * scale / divisor)
            .ok_or_else(overflow)?;
    }

    Ok(nanos)
}
