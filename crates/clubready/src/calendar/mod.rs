/// Matching calendar events against the class table
mod types;

pub use types::*;

use crate::schedule::ClassRecord;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Why an event was left out before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Cancelled,
    NotPermitted,
    BeyondRange,
    NoStartTime,
}

/// Number of events left out, per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub cancelled: usize,
    pub not_permitted: usize,
    pub beyond_range: usize,
    pub no_start: usize,
}

impl DropCounts {
    fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::Cancelled => self.cancelled += 1,
            DropReason::NotPermitted => self.not_permitted += 1,
            DropReason::BeyondRange => self.beyond_range += 1,
            DropReason::NoStartTime => self.no_start += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.cancelled + self.not_permitted + self.beyond_range + self.no_start
    }
}

/// Options for one matching call.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub now: DateTime<Utc>,
    /// Days ahead of `now` an event may start and still be matched
    pub bookable_range_days: u32,
    /// Lower-cased summaries allowed through; `None` allows all
    pub permitted: Option<HashSet<String>>,
}

impl MatchOptions {
    pub fn new(now: DateTime<Utc>, bookable_range_days: u32) -> Self {
        Self {
            now,
            bookable_range_days,
            permitted: None,
        }
    }

    /// Restricts matching to events whose summary is in `summaries` (any case).
    pub fn with_permitted<I, S>(mut self, summaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permitted = Some(
            summaries
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    /// Latest start instant still inside the bookable range.
    ///
    /// Saturates at the last representable instant for very large ranges.
    pub fn max_start(&self) -> DateTime<Utc> {
        TimeDelta::try_days(i64::from(self.bookable_range_days))
            .and_then(|range| self.now.checked_add_signed(range))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the reason `event` is left out, or `None` if it should be matched.
    pub fn drop_reason(&self, event: &CalendarEvent) -> Option<DropReason> {
        if event.is_cancelled() {
            return Some(DropReason::Cancelled);
        }
        if let Some(permitted) = &self.permitted {
            if !permitted.contains(&event.summary.to_lowercase()) {
                return Some(DropReason::NotPermitted);
            }
        }
        match event.start_time() {
            None => Some(DropReason::NoStartTime),
            Some(start) if start > self.max_start() => Some(DropReason::BeyondRange),
            Some(_) => None,
        }
    }
}

/// Lower-cased set of every class name in a class table.
pub fn permitted_summaries(class_table: &[ClassRecord]) -> HashSet<String> {
    class_table.iter().map(ClassRecord::match_key).collect()
}

/// One calendar event and the classes that match it.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub event: &'a CalendarEvent,
    /// Classes with the same name (any case) and the same start instant
    pub classes: Vec<&'a ClassRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome<'a> {
    /// One entry per event that passed filtering, in event order
    pub matches: Vec<MatchResult<'a>>,
    pub dropped: DropCounts,
}

impl<'a> MatchOutcome<'a> {
    /// Every (event, class) pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&'a CalendarEvent, &'a ClassRecord)> + '_ {
        self.matches
            .iter()
            .flat_map(|m| m.classes.iter().map(move |class| (m.event, *class)))
    }
}

/// Joins calendar events to classes by name and exact start instant.
///
/// `events` are expected in ascending start order; the output keeps that
/// order. Names are compared case-insensitively on both sides.
pub fn match_events<'a>(
    events: &'a [CalendarEvent],
    class_table: &'a [ClassRecord],
    options: &MatchOptions,
) -> MatchOutcome<'a> {
    let mut by_class_name: HashMap<String, Vec<&'a ClassRecord>> = HashMap::new();
    for class in class_table {
        by_class_name.entry(class.match_key()).or_default().push(class);
    }

    if events.is_empty() {
        warn!("Did not find any events in calendar");
    }

    let mut outcome = MatchOutcome::default();
    for event in events {
        if let Some(reason) = options.drop_reason(event) {
            debug!(summary = %event.summary, reason = ?reason, "Dropping calendar event");
            outcome.dropped.record(reason);
            continue;
        }

        let candidates = by_class_name
            .get(&event.summary.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        if candidates.is_empty() {
            debug!(summary = %event.summary, "No classes for event");
        }

        let start = event.start_time();
        let classes = candidates
            .iter()
            .copied()
            .filter(|class| class.start_time.is_some() && class.start_time == start)
            .collect();
        outcome.matches.push(MatchResult { event, classes });
    }

    if !events.is_empty() && outcome.matches.is_empty() {
        warn!(
            events = events.len(),
            "Found events in calendar, but none of them are valid"
        );
    }
    info!(
        events = events.len(),
        candidates = outcome.matches.len(),
        matched = outcome.pairs().count(),
        cancelled = outcome.dropped.cancelled,
        not_permitted = outcome.dropped.not_permitted,
        beyond_range = outcome.dropped.beyond_range,
        no_start = outcome.dropped.no_start,
        "Matched calendar events against class table"
    );
    outcome
}
