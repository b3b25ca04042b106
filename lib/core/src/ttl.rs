//! Session TTL parsing.
//!
//! A TTL is written as an optional whole number of days followed by a
//! standard duration: `"30d"`, `"2h"`, `"1d12h"`, `"90m"`, `"0"`.
//! The two parts are validated independently and any malformed component
//! rejects the whole value.

use std::fmt;
use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const SECONDS_PER_DAY: u128 = 24 * 60 * 60;

/// Error returned when a TTL string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlError {
    /// The input that failed to parse.
    pub input: String,
    /// The reason for the parse failure.
    pub reason: String,
}

impl TtlError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid TTL '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for TtlError {}

/// Parses a TTL of the form `[<days>d]<duration>`.
///
/// # Errors
///
/// Returns [`TtlError`] if the day prefix is not a non-negative integer or
/// the remaining duration is malformed.
pub fn parse_ttl(input: &str) -> Result<Duration, TtlError> {
    let (days, rest) = match input.split_once('d') {
        Some((days, rest)) => {
            let days = parse_days(days).map_err(|reason| TtlError::new(input, reason))?;
            (days, rest)
        }
        None => (0, input),
    };

    let rest = if rest.is_empty() { "0" } else { rest };
    let nanos = parse_duration_nanos(rest).map_err(|reason| TtlError::new(input, reason))?;

    let total = (days * SECONDS_PER_DAY * NANOS_PER_SECOND)
        .checked_add(nanos)
        .ok_or_else(|| TtlError::new(input, "duration overflows"))?;

    to_duration(total).ok_or_else(|| TtlError::new(input, "duration overflows"))
}

fn parse_days(days: &str) -> Result<u128, String> {
    if days.is_empty() || !days.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("day count '{days}' is not a whole number"));
    }
    days.parse::<u32>()
        .map(u128::from)
        .map_err(|e| format!("day count '{days}': {e}"))
}

/// Parses a sequence of `<number><unit>` terms, or the bare string `0`.
fn parse_duration_nanos(s: &str) -> Result<u128, String> {
    if s == "0" {
        return Ok(0);
    }
    if s.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }

    let bytes = s.as_bytes();
    let mut pos = 0;
    let mut total: u128 = 0;

    while pos < bytes.len() {
        let int_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        let int_part = &s[int_start..pos];

        let mut frac_part = "";
        if pos < bytes.len() && bytes[pos] == b'.' {
            pos += 1;
            let frac_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            frac_part = &s[frac_start..pos];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("expected a number at offset {int_start}"));
        }

        let unit_start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_digit() && bytes[pos] != b'.' {
            pos += 1;
        }
        let unit = &s[unit_start..pos];
        if unit.is_empty() {
            return Err(format!("missing unit after '{}'", &s[int_start..pos]));
        }
        let unit_nanos = unit_nanos(unit).ok_or_else(|| format!("unknown unit '{unit}'"))?;

        let term = term_nanos(int_part, frac_part, unit_nanos)
            .ok_or_else(|| "duration overflows".to_string())?;
        total = total
            .checked_add(term)
            .ok_or_else(|| "duration overflows".to_string())?;
    }

    Ok(total)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(60 * 60 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn term_nanos(int_part: &str, frac_part: &str, unit_nanos: u128) -> Option<u128> {
    let whole: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    // Digits past nanosecond precision of an hour cannot change the result.
    let frac_part = &frac_part[..frac_part.len().min(18)];
    if !frac_part.is_empty() {
        let numerator: u128 = frac_part.parse().ok()?;
        let denominator = 10u128.pow(u32::try_from(frac_part.len()).ok()?);
        nanos = nanos.checked_add(numerator.checked_mul(unit_nanos)? / denominator)?;
    }
    Some(nanos)
}

fn to_duration(nanos: u128) -> Option<Duration> {
    let secs = u64::try_from(nanos / NANOS_PER_SECOND).ok()?;
    let subsec = u32::try_from(nanos % NANOS_PER_SECOND).ok()?;
    Some(Duration::new(secs, subsec))
}
