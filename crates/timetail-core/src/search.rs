//! Boundary search: offset bisection over a timestamped line log.
//!
//! The search treats the file as the integer range `[0, L)` and bisects it
//! with the predicate "the line owning this offset is timestamped after the
//! threshold". Under the monotonicity precondition (timestamps never decrease
//! in file order) that predicate is false for a prefix of offsets and true
//! for the remaining suffix, so the smallest true offset is the start of the
//! first line to emit.
//!
//! Each probe goes through the [`BoundaryCache`] first; only a miss pays for a
//! [`LineLocator::locate`] and a timestamp parse.
//!
//! # Outcomes
//!
//! | file                         | boundary             | `found` |
//! |------------------------------|----------------------|---------|
//! | some line after threshold    | start of first such  | true    |
//! | every line at/before         | start of last line   | false   |
//! | empty                        | 0                    | false   |
//!
//! The boundary offset is the return value. As a convenience the source
//! cursor is also left at the boundary, so [`BoundarySearch::into_inner`]
//! hands back a source ready to stream the tail.

use std::io::{self, Read, Seek};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::{BoundaryCache, CachedLine};
use crate::error::ErrorCode;
use crate::locate::{DEFAULT_WINDOW_SIZE, LineLocator};
use crate::timestamp::{TimestampError, is_after};

/// Errors that abort a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Seek or read failure on the source.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// A probed line carries no usable timestamp.
    #[error("line at byte {offset}: {source}")]
    Timestamp {
        /// Start offset of the offending line.
        offset: u64,
        /// The offending line's text.
        line: String,
        #[source]
        source: TimestampError,
    },
}

impl SearchError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::ReadFailed,
            Self::Timestamp { source, .. } => source.code(),
        }
    }
}

/// Result of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Boundary {
    /// Offset to start emitting from.
    pub offset: u64,
    /// False when no line is after the threshold.
    pub found: bool,
}

/// Counters collected over one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub file_len: u64,
    pub window_size: usize,
    pub cache_enabled: bool,
    pub probes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub lines_parsed: u64,
    pub boundary: u64,
    pub elapsed_us: u64,
}

/// One bisection over one source against one threshold.
#[derive(Debug)]
pub struct BoundarySearch<R> {
    locator: LineLocator<R>,
    threshold: DateTime<Utc>,
    cache: BoundaryCache,
    probes: u64,
    lines_parsed: u64,
    elapsed_us: u64,
    boundary: Option<Boundary>,
}

impl<R: Read + Seek> BoundarySearch<R> {
    /// Prepare a search with the default scan window and an active cache.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source length cannot be determined.
    pub fn new(source: R, threshold: DateTime<Utc>) -> io::Result<Self> {
        Self::with_window_size(source, threshold, DEFAULT_WINDOW_SIZE)
    }

    /// Prepare a search with a custom backward scan window.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source length cannot be determined.
    pub fn with_window_size(
        source: R,
        threshold: DateTime<Utc>,
        window_size: usize,
    ) -> io::Result<Self> {
        Ok(Self {
            locator: LineLocator::with_window_size(source, window_size)?,
            threshold,
            cache: BoundaryCache::new(),
            probes: 0,
            lines_parsed: 0,
            elapsed_us: 0,
            boundary: None,
        })
    }

    /// Resolve every probe from scratch. Never changes the boundary.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = BoundaryCache::disabled();
        self
    }

    /// Classify the line owning `offset`.
    ///
    /// # Errors
    ///
    /// [`SearchError::Io`] on read failure and [`SearchError::Timestamp`]
    /// when the owning line cannot be parsed.
    pub fn probe(&mut self, offset: u64) -> Result<CachedLine, SearchError> {
        self.probes += 1;
        if let Some(line) = self.cache.lookup(offset) {
            trace!(offset, start = line.start, after = line.after, "cache hit");
            return Ok(line);
        }

        let span = self.locator.locate(offset)?;
        let after = is_after(&span.text, self.threshold).map_err(|source| {
            SearchError::Timestamp {
                offset: span.start,
                line: span.text.clone(),
                source,
            }
        })?;
        self.lines_parsed += 1;
        trace!(offset, start = span.start, after, "classified line");
        Ok(self.cache.record(&span, after))
    }

    /// Run the bisection and position the source cursor at the boundary.
    ///
    /// # Errors
    ///
    /// Any probe error aborts the search unchanged.
    pub fn run(&mut self) -> Result<Boundary, SearchError> {
        let started = Instant::now();
        let len = self.locator.len();

        // Smallest offset in [lo, hi) whose line is after; `len` when none.
        let (mut lo, mut hi) = (0_u64, len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.probe(mid)?.after {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let boundary = if lo < len {
            Boundary {
                offset: lo,
                found: true,
            }
        } else if len == 0 {
            Boundary {
                offset: 0,
                found: false,
            }
        } else {
            Boundary {
                offset: self.probe(len - 1)?.start,
                found: false,
            }
        };

        self.locator.seek_to(boundary.offset)?;
        self.elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.boundary = Some(boundary);

        debug!(
            offset = boundary.offset,
            found = boundary.found,
            probes = self.probes,
            cache_hits = self.cache.hits(),
            lines_parsed = self.lines_parsed,
            "boundary search finished"
        );
        Ok(boundary)
    }

    /// Counters for the search so far.
    #[must_use]
    pub fn stats(&self) -> SearchStats {
        SearchStats {
            file_len: self.locator.len(),
            window_size: self.locator.window_size(),
            cache_enabled: self.cache.is_enabled(),
            probes: self.probes,
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            lines_parsed: self.lines_parsed,
            boundary: self.boundary.map_or(0, |b| b.offset),
            elapsed_us: self.elapsed_us,
        }
    }

    /// Give back the source. After [`BoundarySearch::run`] its cursor is at
    /// the boundary.
    pub fn into_inner(self) -> R {
        self.locator.into_inner()
    }
}

/// Search `source` once with default settings.
///
/// # Errors
///
/// See [`BoundarySearch::run`].
pub fn find_boundary<R: Read + Seek>(
    source: R,
    threshold: DateTime<Utc>,
) -> Result<Boundary, SearchError> {
    BoundarySearch::new(source, threshold)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::io::Cursor;

    const EXAMPLE: &str = concat!(
        "1.1.1.1 - - [01/Jan/2021:00:00:00 +0000] \"GET /a\"\n",
        "1.1.1.1 - - [01/Jan/2021:02:00:00 +0000] \"GET /b\"\n",
        "1.1.1.1 - - [01/Jan/2021:04:00:00 +0000] \"GET /c\"\n",
    );

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, hour, 0, 0).unwrap()
    }

    fn source(content: &str) -> Cursor<Vec<u8>> {
        Cursor::new(content.as_bytes().to_vec())
    }

    fn line_start(content: &str, index: usize) -> u64 {
        content.split_inclusive('\n').take(index).map(str::len).sum::<usize>() as u64
    }

    #[test]
    fn example_scenario_skips_first_line() {
        let mut search = BoundarySearch::new(source(EXAMPLE), at(1)).unwrap();
        let boundary = search.run().unwrap();
        assert!(boundary.found);
        assert_eq!(boundary.offset, line_start(EXAMPLE, 1));

        let mut rest = String::new();
        search.into_inner().read_to_string(&mut rest).unwrap();
        assert!(rest.starts_with("1.1.1.1 - - [01/Jan/2021:02:00:00"));
        assert_eq!(rest.lines().count(), 2);
    }

    #[test]
    fn threshold_before_everything_gives_zero() {
        let boundary = find_boundary(source(EXAMPLE), at(0) - TimeDelta::hours(1)).unwrap();
        assert_eq!(
            boundary,
            Boundary {
                offset: 0,
                found: true
            }
        );
    }

    #[test]
    fn threshold_after_everything_gives_last_line() {
        let boundary = find_boundary(source(EXAMPLE), at(5)).unwrap();
        assert_eq!(
            boundary,
            Boundary {
                offset: line_start(EXAMPLE, 2),
                found: false
            }
        );
    }

    #[test]
    fn equal_timestamp_is_not_after() {
        let boundary = find_boundary(source(EXAMPLE), at(2)).unwrap();
        assert_eq!(boundary.offset, line_start(EXAMPLE, 2));
        assert!(boundary.found);
    }

    #[test]
    fn repeated_timestamps_resolve_to_first_after() {
        let content = concat!(
            "[01/Jan/2021:00:00:00 +0000] a\n",
            "[01/Jan/2021:01:00:00 +0000] b\n",
            "[01/Jan/2021:01:00:00 +0000] c\n",
            "[01/Jan/2021:03:00:00 +0000] d\n",
            "[01/Jan/2021:03:00:00 +0000] e\n",
        );
        let boundary = find_boundary(source(content), at(2)).unwrap();
        assert_eq!(boundary.offset, line_start(content, 3));
    }

    #[test]
    fn empty_source_gives_zero_not_found() {
        let boundary = find_boundary(source(""), at(0)).unwrap();
        assert_eq!(
            boundary,
            Boundary {
                offset: 0,
                found: false
            }
        );
    }

    #[test]
    fn unterminated_last_line_is_searchable() {
        let content = "[01/Jan/2021:00:00:00 +0000] a\n[01/Jan/2021:02:00:00 +0000] b";
        let boundary = find_boundary(source(content), at(1)).unwrap();
        assert_eq!(boundary.offset, line_start(content, 1));
    }

    #[test]
    fn malformed_line_aborts_with_its_offset() {
        let content = concat!(
            "[01/Jan/2021:00:00:00 +0000] a\n",
            "garbage without a timestamp\n",
            "[01/Jan/2021:02:00:00 +0000] c\n",
        );
        let mut search = BoundarySearch::with_window_size(source(content), at(1), 4).unwrap();
        // Probe the bad line directly; bisection may or may not land on it.
        let err = search.probe(line_start(content, 1) + 3).unwrap_err();
        match err {
            SearchError::Timestamp { offset, ref line, .. } => {
                assert_eq!(offset, line_start(content, 1));
                assert_eq!(line, "garbage without a timestamp");
            }
            SearchError::Io(_) => panic!("expected timestamp error"),
        }
        assert_eq!(err.code(), ErrorCode::MissingTimestamp);
    }

    #[test]
    fn single_malformed_line_fails_the_search() {
        let err = find_boundary(source("nothing to see\n"), at(1)).unwrap_err();
        assert!(matches!(err, SearchError::Timestamp { offset: 0, .. }));
    }

    #[test]
    fn converging_probes_hit_the_cache() {
        let mut content = String::new();
        for minute in 0..60 {
            content.push_str(&format!(
                "10.0.0.{minute} - - [01/Jan/2021:01:{minute:02}:00 +0000] \"GET /{minute}\" 200\n"
            ));
        }
        let threshold = Utc.with_ymd_and_hms(2021, 1, 1, 1, 29, 30).unwrap();
        let mut search = BoundarySearch::new(source(&content), threshold).unwrap();
        let boundary = search.run().unwrap();
        assert_eq!(boundary.offset, line_start(&content, 30));

        let stats = search.stats();
        assert!(stats.cache_hits > 0, "{stats:?}");
        assert_eq!(stats.probes, stats.cache_hits + stats.cache_misses);
        assert_eq!(stats.lines_parsed, stats.cache_misses);
        assert_eq!(stats.boundary, boundary.offset);
    }

    #[test]
    fn disabling_the_cache_keeps_the_boundary() {
        let cached = find_boundary(source(EXAMPLE), at(3)).unwrap();
        let mut search = BoundarySearch::new(source(EXAMPLE), at(3))
            .unwrap()
            .without_cache();
        let uncached = search.run().unwrap();
        assert_eq!(cached, uncached);
        let stats = search.stats();
        assert!(!stats.cache_enabled);
        assert_eq!(stats.cache_hits, 0);
    }
}
