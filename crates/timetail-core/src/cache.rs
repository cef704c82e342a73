//! Per-search memo of resolved lines.
//!
//! Bisection converges by probing offsets that increasingly fall inside lines
//! it has already read. [`BoundaryCache`] remembers each resolved line span
//! together with its classification so such probes skip the backward scan and
//! the timestamp parse entirely.
//!
//! Spans are keyed by line start in an ordered map; an offset is covered when
//! the nearest recorded start at or below it has an end at or above it. This
//! marks every offset of a line as resolved without storing one entry per
//! byte.

use std::collections::BTreeMap;

use crate::locate::LineSpan;

/// A cached line classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedLine {
    pub start: u64,
    pub end: u64,
    /// Whether the line's timestamp is after the threshold.
    pub after: bool,
}

/// Lookup-then-record cache scoped to a single search.
#[derive(Debug, Clone)]
pub struct BoundaryCache {
    lines: BTreeMap<u64, CachedLine>,
    enabled: bool,
    hits: u64,
    misses: u64,
}

impl Default for BoundaryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryCache {
    /// An empty, active cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
            enabled: true,
            hits: 0,
            misses: 0,
        }
    }

    /// A cache that never hits and never stores anything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            lines: BTreeMap::new(),
            enabled: false,
            hits: 0,
            misses: 0,
        }
    }

    /// Returns true unless built with [`BoundaryCache::disabled`].
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The classification of the line covering `offset`, if known.
    pub fn lookup(&mut self, offset: u64) -> Option<CachedLine> {
        let found = self
            .lines
            .range(..=offset)
            .next_back()
            .map(|(_, line)| *line)
            .filter(|line| offset <= line.end);

        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Remember that every offset of `span` classifies as `after`.
    pub fn record(&mut self, span: &LineSpan, after: bool) -> CachedLine {
        let line = CachedLine {
            start: span.start,
            end: span.end,
            after,
        };
        if self.enabled {
            self.lines.insert(span.start, line);
        }
        line
    }

    /// Number of distinct lines recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}
