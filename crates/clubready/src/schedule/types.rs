/// Types for parsed class schedule data
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A boolean that can also be explicitly indeterminate.
///
/// Serialized as JSON `true`, `false` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
    True,
    False,
    #[default]
    Unknown,
}

impl TriState {
    /// Returns true only for `TriState::True`.
    pub fn is_true(self) -> bool {
        matches!(self, TriState::True)
    }

    /// Returns true only for `TriState::False`.
    pub fn is_false(self) -> bool {
        matches!(self, TriState::False)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, TriState::Unknown)
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::True,
            Some(false) => TriState::False,
            None => TriState::Unknown,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        Self::from(Some(value))
    }
}

impl From<TriState> for Option<bool> {
    fn from(value: TriState) -> Self {
        match value {
            TriState::True => Some(true),
            TriState::False => Some(false),
            TriState::Unknown => None,
        }
    }
}

/// One class offering on one date, as shown in the weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Empty if no text preceded the duration line
    pub class_name: String,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    /// Raw duration text, e.g. "1 hour 30 mins"
    pub duration_text: Option<String>,
    pub instructor: Option<String>,
    pub registered: Option<u32>,
    pub class_size: Option<u32>,
    /// Known only when both `registered` and `class_size` are known
    pub spots_available: TriState,
    /// Opaque action token taken from the booking control (its `onclick`)
    pub booking_id: Option<String>,
    pub booked: TriState,
    /// True when `start_time` is missing or in the past
    pub started: bool,
    /// True when `end_time` is missing or in the past
    pub ended: bool,
}

impl ClassRecord {
    /// Lower-cased class name used as the matching key.
    pub fn match_key(&self) -> String {
        self.class_name.to_lowercase()
    }

    /// Recomputes `started`/`ended` against `now`.
    ///
    /// Needed for tables read back from the cache, whose flags reflect the
    /// time they were parsed.
    pub fn refresh_elapsed(&mut self, now: DateTime<Utc>) {
        self.started = has_passed(self.start_time, now);
        self.ended = has_passed(self.end_time, now);
    }
}

/// True when `instant` is before `now`, or unknown.
pub fn has_passed(instant: Option<DateTime<FixedOffset>>, now: DateTime<Utc>) -> bool {
    instant.map_or(true, |t| t < now)
}

/// Date range covered by the displayed week (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekSpan {
    /// Every calendar date from `start` to `end`, inclusive.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|date| *date <= self.end)
            .collect()
    }

    /// Number of dates in the span, `(end - start).days + 1`.
    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for WeekSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%m/%d/%Y"),
            self.end.format("%m/%d/%Y")
        )
    }
}
