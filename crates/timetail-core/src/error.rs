use std::fmt;

/// Machine-readable error codes for scripts wrapping `timetail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileOpenFailed,
    ConfigParseError,
    InvalidThreshold,
    MissingTimestamp,
    MalformedTimestamp,
    ReadFailed,
    OutputFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::FileOpenFailed => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidThreshold => "E1003",
            Self::MissingTimestamp => "E2001",
            Self::MalformedTimestamp => "E2002",
            Self::ReadFailed => "E3001",
            Self::OutputFailed => "E3002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::FileOpenFailed => "Log file could not be opened",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidThreshold => "Invalid threshold",
            Self::MissingTimestamp => "Line has no bracketed timestamp",
            Self::MalformedTimestamp => "Timestamp does not match the combined log format",
            Self::ReadFailed => "Log file read failed",
            Self::OutputFailed => "Writing output failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::FileOpenFailed => Some("Check the path and read permissions."),
            Self::ConfigParseError => Some("Fix syntax in timetail/config.toml and retry."),
            Self::InvalidThreshold => Some(
                "Use a duration like `90m`, `2h` or `1h30m`, or an RFC 3339 / `01/Jan/2021:00:00:00 +0000` timestamp.",
            ),
            Self::MissingTimestamp | Self::MalformedTimestamp => Some(
                "Every line must carry a `[DD/Mon/YYYY:HH:MM:SS +HHMM]` timestamp in file order.",
            ),
            Self::ReadFailed => None,
            Self::OutputFailed => Some("The output pipe may have been closed early."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
