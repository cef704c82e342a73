//! Combined-log timestamp extraction.
//!
//! Access logs in the conventional web-server format carry exactly one
//! timestamp per line, enclosed in square brackets:
//!
//! ```text
//! 10.0.0.1 - - [01/Jan/2021:02:00:00 +0000] "GET /b HTTP/1.1" 200 512
//! ```
//!
//! Only the first `[`…`]` segment is inspected. Anything else on the line is
//! ignored, including later bracketed text.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::ErrorCode;

/// `DD/Mon/YYYY:HH:MM:SS ±HHMM`.
pub const COMBINED_LOG_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Errors raised while extracting a line's timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// The line has no `[`…`]` pair to take a timestamp from.
    #[error("no bracketed timestamp in line")]
    MissingBrackets,

    /// The bracketed text does not match [`COMBINED_LOG_FORMAT`].
    #[error("invalid timestamp '{raw}': {reason}")]
    InvalidFormat { raw: String, reason: String },
}

impl TimestampError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingBrackets => ErrorCode::MissingTimestamp,
            Self::InvalidFormat { .. } => ErrorCode::MalformedTimestamp,
        }
    }
}

const MONTHS: [&[u8]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov", b"Dec",
];

/// Whether `raw` has the exact `DD/Mon/YYYY:HH:MM:SS ±HHMM` layout.
///
/// chrono accepts one-digit fields, any month casing and `+HH:MM` offsets;
/// log lines must use the zero-padded form.
fn has_fixed_shape(raw: &str) -> bool {
    let b = raw.as_bytes();
    if b.len() != 26 {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    digits(0..2)
        && b[2] == b'/'
        && MONTHS.contains(&&b[3..6])
        && b[6] == b'/'
        && digits(7..11)
        && b[11] == b':'
        && digits(12..14)
        && b[14] == b':'
        && digits(15..17)
        && b[17] == b':'
        && digits(18..20)
        && b[20] == b' '
        && matches!(b[21], b'+' | b'-')
        && digits(22..26)
}

/// Return the text enclosed by the first bracket pair of `line`.
fn bracketed(line: &str) -> Option<&str> {
    let open = line.find('[')?;
    let rest = &line[open + 1..];
    let close = rest.find(']')?;
    Some(&rest[..close])
}

/// Parse the first bracketed timestamp of a line.
///
/// # Errors
///
/// [`TimestampError::MissingBrackets`] when there is no `[`…`]` pair, and
/// [`TimestampError::InvalidFormat`] when the enclosed text is not a
/// combined-log timestamp.
pub fn parse_line_timestamp(line: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let raw = bracketed(line).ok_or(TimestampError::MissingBrackets)?;
    if !has_fixed_shape(raw) {
        return Err(TimestampError::InvalidFormat {
            raw: raw.to_string(),
            reason: "expected DD/Mon/YYYY:HH:MM:SS ±HHMM".to_string(),
        });
    }
    DateTime::parse_from_str(raw, COMBINED_LOG_FORMAT).map_err(|err| {
        TimestampError::InvalidFormat {
            raw: raw.to_string(),
            reason: err.to_string(),
        }
    })
}

/// Whether the line's timestamp is strictly after `threshold`.
///
/// # Errors
///
/// Propagates [`parse_line_timestamp`] failures.
pub fn is_after(line: &str, threshold: DateTime<Utc>) -> Result<bool, TimestampError> {
    Ok(parse_line_timestamp(line)?.with_timezone(&Utc) > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LINE: &str = r#"1.1.1.1 - - [01/Jan/2021:02:00:00 +0000] "GET /b""#;

    #[test]
    fn parses_combined_log_timestamp() {
        let ts = parse_line_timestamp(LINE).unwrap();
        assert_eq!(
            ts.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2021, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn honours_utc_offset() {
        let ts = parse_line_timestamp("x [01/Jan/2021:02:00:00 +0130] y").unwrap();
        assert_eq!(
            ts.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn only_first_bracket_pair_counts() {
        let ts = parse_line_timestamp("[10/Feb/2022:13:55:36 -0700] [not a time]").unwrap();
        assert_eq!(
            ts.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2022, 2, 10, 20, 55, 36).unwrap()
        );
    }

    #[test]
    fn missing_brackets_is_an_error() {
        assert_eq!(
            parse_line_timestamp("no timestamp here"),
            Err(TimestampError::MissingBrackets)
        );
        assert_eq!(
            parse_line_timestamp("opened [ but never closed"),
            Err(TimestampError::MissingBrackets)
        );
        assert_eq!(parse_line_timestamp(""), Err(TimestampError::MissingBrackets));
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let err = parse_line_timestamp("x [2021-01-01T00:00:00Z] y").unwrap_err();
        assert!(matches!(
            err,
            TimestampError::InvalidFormat { ref raw, .. } if raw == "2021-01-01T00:00:00Z"
        ));
        assert_eq!(err.code(), ErrorCode::MalformedTimestamp);
    }

    #[test]
    fn missing_offset_is_an_error() {
        assert!(parse_line_timestamp("[01/Jan/2021:02:00:00]").is_err());
    }

    #[test]
    fn loose_field_widths_are_rejected() {
        for raw in [
            "1/Jan/2021:00:00:00 +0000",
            "01/Jan/2021:0:0:0 +0000",
            "01/Jan/2021:00:00:00 +00:00",
            "01/Jan/2021:00:00:00 +000",
            "01/Jan/21:00:00:00 +0000",
        ] {
            let err = parse_line_timestamp(&format!("x [{raw}] y")).unwrap_err();
            assert!(
                matches!(err, TimestampError::InvalidFormat { raw: ref r, .. } if r == raw),
                "{raw}"
            );
        }
    }

    #[test]
    fn month_name_is_case_sensitive() {
        assert!(parse_line_timestamp("[01/jan/2021:00:00:00 +0000]").is_err());
        assert!(parse_line_timestamp("[01/JAN/2021:00:00:00 +0000]").is_err());
        assert!(parse_line_timestamp("[01/Jan/2021:00:00:00 +0000]").is_ok());
    }

    #[test]
    fn surrounding_text_inside_brackets_is_rejected() {
        assert!(parse_line_timestamp("[ 01/Jan/2021:00:00:00 +0000]").is_err());
        assert!(parse_line_timestamp("[01/Jan/2021:00:00:00 +0000 ]").is_err());
        assert!(parse_line_timestamp("[01/Jan/2021:00:00:00 +0000 UTC]").is_err());
    }

    #[test]
    fn fixed_shape_still_checks_ranges() {
        assert!(parse_line_timestamp("[32/Jan/2021:00:00:00 +0000]").is_err());
        assert!(parse_line_timestamp("[01/Jan/2021:24:00:00 +0000]").is_err());
        assert!(parse_line_timestamp("[31/Dec/2021:23:59:59 -1200]").is_ok());
    }

    #[test]
    fn is_after_is_strict() {
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 2, 0, 0).unwrap();
        assert!(!is_after(LINE, at).unwrap());
        assert!(is_after(LINE, at - chrono::TimeDelta::seconds(1)).unwrap());
        assert!(!is_after(LINE, at + chrono::TimeDelta::seconds(1)).unwrap());
    }
}
