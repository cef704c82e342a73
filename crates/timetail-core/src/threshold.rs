//! Threshold acquisition: relative windows and absolute instants.
//!
//! A threshold is either a window reaching back from "now" (`--since 2h`)
//! or an absolute instant (`--after 2021-01-01T01:00:00Z`). Durations use
//! compound unit strings such as `90s`, `15m`, `1h30m`, `2d` or `1w`; a bare
//! integer is a number of seconds.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ErrorCode;
use crate::timestamp::COMBINED_LOG_FORMAT;

/// Window used when nothing else is configured.
pub const DEFAULT_SINCE: &str = "2h";

/// Errors raised while parsing a threshold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("empty duration")]
    EmptyDuration,

    #[error("invalid duration '{0}': expected forms like 90s, 15m, 2h, 1h30m, 1d, 1w")]
    InvalidDuration(String),

    #[error("duration '{0}' is out of range")]
    DurationOverflow(String),

    #[error("invalid timestamp '{0}': expected RFC 3339 or DD/Mon/YYYY:HH:MM:SS +HHMM")]
    InvalidTimestamp(String),
}

impl ThresholdError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidThreshold
    }
}

/// Where the cutoff instant comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Lines newer than `now - window`.
    Since(TimeDelta),
    /// Lines newer than a fixed instant.
    After(DateTime<Utc>),
}

impl Threshold {
    /// Resolve to an absolute instant relative to `now`.
    ///
    /// # Errors
    ///
    /// [`ThresholdError::DurationOverflow`] when the window reaches before
    /// the earliest representable instant.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ThresholdError> {
        match self {
            Self::Since(window) => now
                .checked_sub_signed(window)
                .ok_or_else(|| ThresholdError::DurationOverflow(window.to_string())),
            Self::After(at) => Ok(at),
        }
    }
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "s" | "sec" | "secs" => Some(1),
        "m" | "min" | "mins" => Some(60),
        "h" | "hr" | "hrs" => Some(3_600),
        "d" | "day" | "days" => Some(86_400),
        "w" | "wk" | "wks" => Some(604_800),
        _ => None,
    }
}

/// Parse a compound duration string.
///
/// # Errors
///
/// [`ThresholdError::EmptyDuration`], [`ThresholdError::InvalidDuration`]
/// for unknown units or stray characters, and
/// [`ThresholdError::DurationOverflow`] for values too large to represent.
pub fn parse_duration(input: &str) -> Result<TimeDelta, ThresholdError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ThresholdError::EmptyDuration);
    }
    let invalid = || ThresholdError::InvalidDuration(raw.to_string());
    let overflow = || ThresholdError::DurationOverflow(raw.to_string());

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = raw.parse().map_err(|_| overflow())?;
        return TimeDelta::try_seconds(secs).ok_or_else(overflow);
    }

    let mut total: i64 = 0;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(digits);
        let letters = tail.bytes().take_while(u8::is_ascii_alphabetic).count();
        let (unit, tail) = tail.split_at(letters);

        let value: i64 = number.parse().map_err(|_| overflow())?;
        let scale = unit_seconds(&unit.to_ascii_lowercase()).ok_or_else(invalid)?;
        total = value
            .checked_mul(scale)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(overflow)?;
        rest = tail;
    }

    TimeDelta::try_seconds(total).ok_or_else(overflow)
}

/// Parse an absolute instant given as RFC 3339 or in the combined log format.
///
/// # Errors
///
/// [`ThresholdError::InvalidTimestamp`] when neither format matches.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, ThresholdError> {
    let raw = input.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, COMBINED_LOG_FORMAT))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ThresholdError::InvalidTimestamp(raw.to_string()))
}
