//! Line boundary location over a seekable byte source.
//!
//! Given any byte offset into a file, [`LineLocator::locate`] finds the start
//! of the line that owns that offset by reading fixed-size windows backwards
//! until a `\n` (or the start of the file) is found, then reads forward to the
//! end of the line.
//!
//! # Ownership of offsets
//!
//! A line owns its bytes *and* its terminating `\n`. An offset that points at
//! a `\n` therefore resolves to the line the newline ends, and an offset that
//! points just past a `\n` resolves to the following line.
//!
//! # Invariants
//!
//! - Backward scanning counts down an explicit `remaining` distance and never
//!   issues a zero-length read; offset 0 resolves to line start 0 immediately.
//! - After [`LineLocator::locate`] returns, the source cursor sits at the
//!   returned line start.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

/// Default size of the backward scan window, in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// One resolved line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    /// Offset of the first byte of the line.
    pub start: u64,
    /// Offset of the terminating `\n`, or the source length when the last
    /// line is unterminated.
    pub end: u64,
    /// Line content without the newline (and without a trailing `\r`).
    pub text: String,
}

impl LineSpan {
    /// Returns true when `offset` belongs to this line.
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset <= self.end
    }
}

/// Resolves arbitrary offsets to the lines that own them.
#[derive(Debug)]
pub struct LineLocator<R> {
    source: R,
    len: u64,
    window: Vec<u8>,
}

impl<R: Read + Seek> LineLocator<R> {
    /// Wrap a source using the [`DEFAULT_WINDOW_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source length cannot be determined.
    pub fn new(source: R) -> io::Result<Self> {
        Self::with_window_size(source, DEFAULT_WINDOW_SIZE)
    }

    /// Wrap a source with a custom scan window. A size of 0 is raised to 1.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source length cannot be determined.
    pub fn with_window_size(mut source: R, window_size: usize) -> io::Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            source,
            len,
            window: vec![0; window_size.max(1)],
        })
    }

    /// Total length of the source in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns true when the source holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the scan window in bytes.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Resolve `offset` to its owning line. Offsets past the end are clamped
    /// to the source length.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if any seek or read fails, including a source
    /// that is shorter than its reported length.
    pub fn locate(&mut self, offset: u64) -> io::Result<LineSpan> {
        let offset = offset.min(self.len);
        let start = self.scan_back(offset)?;
        let (end, raw) = self.scan_forward(start)?;
        self.source.seek(SeekFrom::Start(start))?;

        let mut text = String::from_utf8_lossy(&raw).into_owned();
        if text.ends_with('\r') {
            text.pop();
        }

        trace!(offset, start, end, "located line");
        Ok(LineSpan { start, end, text })
    }

    /// Move the cursor to an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the seek fails.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.source.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Give back the underlying source, cursor untouched.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Number of bytes to read when `remaining` bytes are left in the
    /// direction of travel.
    fn chunk_len(&self, remaining: u64) -> usize {
        usize::try_from(remaining).map_or(self.window.len(), |r| r.min(self.window.len()))
    }

    /// Offset just past the nearest `\n` strictly before `offset`, or 0.
    fn scan_back(&mut self, offset: u64) -> io::Result<u64> {
        let mut remaining = offset;
        while remaining > 0 {
            let step = self.chunk_len(remaining);
            let from = remaining - step as u64;
            let buf = &mut self.window[..step];
            self.source.seek(SeekFrom::Start(from))?;
            self.source.read_exact(buf)?;
            if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
                return Ok(from + pos as u64 + 1);
            }
            remaining = from;
        }
        Ok(0)
    }

    /// Read from `start` up to the next `\n` or the end of the source.
    fn scan_forward(&mut self, start: u64) -> io::Result<(u64, Vec<u8>)> {
        self.source.seek(SeekFrom::Start(start))?;
        let mut line = Vec::new();
        let mut pos = start;
        while pos < self.len {
            let step = self.chunk_len(self.len - pos);
            let buf = &mut self.window[..step];
            self.source.read_exact(buf)?;
            if let Some(i) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..i]);
                return Ok((pos + i as u64, line));
            }
            line.extend_from_slice(buf);
            pos += step as u64;
        }
        Ok((self.len, line))
    }
}
