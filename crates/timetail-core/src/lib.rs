//! timetail-core library.
//!
//! Finds where "recent" starts in a timestamped, append-only line log by
//! bisecting byte offsets instead of scanning, then streams the tail.
//!
//! ```no_run
//! use std::fs::File;
//! use timetail_core::search::BoundarySearch;
//! use timetail_core::tail::copy_tail;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let threshold = chrono::Utc::now() - chrono::TimeDelta::hours(2);
//! let mut search = BoundarySearch::new(File::open("access.log")?, threshold)?;
//! let boundary = search.run()?;
//! eprintln!("recent lines start at byte {}", boundary.offset);
//! copy_tail(search.into_inner(), std::io::stdout().lock())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module, each mapping to an [`error::ErrorCode`].
//! - **Logging**: `tracing` macros; the library never installs a subscriber.

pub mod cache;
pub mod config;
pub mod error;
pub mod locate;
pub mod search;
pub mod tail;
pub mod threshold;
pub mod timestamp;
