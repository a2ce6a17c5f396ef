//! Error types for schedule extraction and the class table cache.

use super::types::WeekSpan;
use chrono::{NaiveDate, NaiveTime};
use std::path::PathBuf;
use thiserror::Error;

/// Structural errors that abort extraction of the whole schedule.
///
/// Any of these usually means the site layout changed or the page did not
/// finish loading.
#[derive(Debug, Error, Clone)]
pub enum ScheduleError {
    /// A required element was not found in the page
    #[error("Schedule page has no element matching `{selector}`")]
    MissingElement { selector: &'static str },

    /// The week range header was not in `M/D/YYYY - M/D/YYYY` form
    #[error("Could not read week span from header text {text:?}")]
    InvalidWeekSpan { text: String },

    /// The week range header does not go forward in time
    #[error("Week span is not increasing: {start} - {end}")]
    WeekSpanOrder { start: NaiveDate, end: NaiveDate },

    /// The number of date columns does not match the week span
    #[error("Week span {span} has {dates} dates but the page has {columns} columns")]
    ColumnMismatch {
        span: WeekSpan,
        dates: usize,
        columns: usize,
    },
}

impl ScheduleError {
    /// Returns true if this error points at a page layout the parser does not know.
    pub fn is_layout_change(&self) -> bool {
        matches!(
            self,
            ScheduleError::MissingElement { .. } | ScheduleError::ColumnMismatch { .. }
        )
    }
}

/// Errors local to a single class cell. The cell is dropped, the rest of the
/// schedule is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Looked like a clock time but is not one (e.g. "13:75 PM")
    #[error("Invalid clock time {text:?}")]
    InvalidClockTime { text: String },

    /// The local time does not exist on that date in the schedule timezone
    #[error("{time} does not exist on {date} in the schedule timezone")]
    NonexistentLocalTime { date: NaiveDate, time: NaiveTime },

    /// "spaces occupied" without a `<int> / <int>` pair
    #[error("Malformed occupancy text {text:?}")]
    MalformedOccupancy { text: String },

    /// Duration quantity too large to add to a timestamp
    #[error("Duration out of range in {text:?}")]
    DurationOverflow { text: String },
}

/// Errors reading or writing the cached class table.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cached document is not a valid class table
    #[error("Malformed class table cache: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Reading or writing the cache file failed
    #[error("Cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
