//! Time parsing utilities for scheduler output.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::time::Duration;
use thiserror::Error;

/// Canonical Slurm timestamp layout, e.g. `2024-01-15T10:30:00`.
pub const SLURM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("could not parse time {value:?}: {source}")]
    Invalid {
        value: String,
        source: chrono::ParseError,
    },
    #[error("time {0:?} does not exist in UTC")]
    Ambiguous(String),
}

/// Outcome of parsing a duration that did not yield a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The scheduler reported no limit. Callers usually leave the field unset.
    #[error("duration is unlimited")]
    Unlimited,
    #[error("could not parse duration {0:?}")]
    Invalid(String),
}

/// Literals Slurm prints in place of a timestamp that has not happened.
fn is_time_placeholder(s: &str) -> bool {
    s.is_empty() || s == "N/A" || s == "Unknown" || s == "None"
}

/// Parse a Slurm timestamp (`YYYY-MM-DDTHH:MM:SS`).
///
/// Placeholder values (`Unknown`, `None`, `N/A`, empty) yield `Ok(None)`.
/// Anything else that does not match the layout is an error naming the literal.
pub fn parse_slurm_timestamp(s: &str) -> Result<Option<DateTime<Utc>>, TimeError> {
    let s = s.trim();
    if is_time_placeholder(s) {
        return Ok(None);
    }
    let naive =
        NaiveDateTime::parse_from_str(s, SLURM_TIME_FORMAT).map_err(|source| TimeError::Invalid {
            value: s.to_string(),
            source,
        })?;
    Utc.from_local_datetime(&naive)
        .single()
        .map(Some)
        .ok_or_else(|| TimeError::Ambiguous(s.to_string()))
}

/// Parse a Slurm duration.
///
/// Accepted forms are `minutes`, `minutes:seconds`, `hours:minutes:seconds`,
/// `days-hours`, `days-hours:minutes` and `days-hours:minutes:seconds`.
/// `UNLIMITED` and `INFINITE` produce [`DurationError::Unlimited`].
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("UNLIMITED") || s.eq_ignore_ascii_case("INFINITE") {
        return Err(DurationError::Unlimited);
    }

    let invalid = || DurationError::Invalid(s.to_string());
    let number = |p: &str| -> Result<u64, DurationError> {
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        p.parse::<u64>().map_err(|_| invalid())
    };

    let (days, clock) = match s.split_once('-') {
        Some((d, rest)) => (Some(number(d)?), rest),
        None => (None, s),
    };

    let parts = clock
        .split(':')
        .map(number)
        .collect::<Result<Vec<u64>, _>>()?;

    let (hours, minutes, seconds) = match (days.is_some(), parts.as_slice()) {
        (false, [m]) => (0, *m, 0),
        (false, [m, s]) => (0, *m, *s),
        (_, [h, m, s]) => (*h, *m, *s),
        (true, [h]) => (*h, 0, 0),
        (true, [h, m]) => (*h, *m, 0),
        _ => return Err(invalid()),
    };

    let total = days
        .unwrap_or(0)
        .checked_mul(86400)
        .and_then(|t| t.checked_add(hours.checked_mul(3600)?))
        .and_then(|t| t.checked_add(minutes.checked_mul(60)?))
        .and_then(|t| t.checked_add(seconds))
        .ok_or_else(invalid)?;
    Ok(Duration::from_secs(total))
}

/// Parse exit code from Slurm format (`exit_code:signal`).
///
/// Returns the exit code portion, or `None` when it is not a number.
pub fn parse_exit_code(s: &str) -> Option<i32> {
    s.trim().split(':').next().and_then(|v| v.parse().ok())
}
