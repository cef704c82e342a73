//! Verbatim copy of everything from the boundary to end of file.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};

use serde::Serialize;

use crate::error::ErrorCode;

/// Errors raised while streaming the tail.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("reading log failed: {0}")]
    Read(#[source] io::Error),

    #[error("writing output failed: {0}")]
    Write(#[source] io::Error),
}

impl TailError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read(_) => ErrorCode::ReadFailed,
            Self::Write(_) => ErrorCode::OutputFailed,
        }
    }
}

/// What a copy produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TailSummary {
    /// Lines written.
    pub lines: u64,
    /// Source bytes consumed.
    pub bytes: u64,
}

/// Copy `source` line by line to `out`, from its current position to EOF.
///
/// Each line is written with one `write_all`, bytes unchanged. A final line
/// without a newline gets one appended.
///
/// # Errors
///
/// [`TailError::Read`] or [`TailError::Write`]; whatever was written before
/// the failure stays written.
pub fn copy_tail<R: Read, W: Write>(source: R, mut out: W) -> Result<TailSummary, TailError> {
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    let mut summary = TailSummary::default();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).map_err(TailError::Read)?;
        if n == 0 {
            break;
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        out.write_all(&line).map_err(TailError::Write)?;
        summary.lines += 1;
        summary.bytes += n as u64;
    }

    out.flush().map_err(TailError::Write)?;
    Ok(summary)
}

/// Seek `source` to `offset` and [`copy_tail`] from there.
///
/// # Errors
///
/// See [`copy_tail`]; a failed seek is a [`TailError::Read`].
pub fn copy_from<R: Read + Seek, W: Write>(
    mut source: R,
    offset: u64,
    out: W,
) -> Result<TailSummary, TailError> {
    source
        .seek(SeekFrom::Start(offset))
        .map_err(TailError::Read)?;
    copy_tail(source, out)
}
