//! Clock-time and duration tokens found in class cell text.

use super::error::CellError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

static CLOCK_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*([AaPp][Mm])$").unwrap());
static DURATION_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+(hour|hr|min)").unwrap());
static QUANTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+([A-Za-z]+)").unwrap());

/// Unit of one `<int> <unit>` pair inside a duration fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationUnit {
    Hours,
    Minutes,
    Unknown(String),
}

impl DurationUnit {
    fn from_word(word: &str) -> Self {
        let lower = word.to_lowercase();
        if lower.starts_with("hour") || lower == "hr" || lower == "hrs" {
            DurationUnit::Hours
        } else if lower.starts_with("min") {
            DurationUnit::Minutes
        } else {
            DurationUnit::Unknown(word.to_string())
        }
    }
}

/// A recognized duration fragment, e.g. "1 hour 30 mins".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationToken {
    /// Sum of every recognized quantity
    pub total: TimeDelta,
    /// Unit words that were not hours or minutes
    pub skipped_units: Vec<String>,
}

/// Recognizes a whole-fragment 12-hour clock time such as "10:30 AM".
///
/// Returns `None` when the fragment is not shaped like a clock time, and an
/// error when it is shaped like one but names no real time of day.
pub fn parse_clock_time(fragment: &str) -> Option<Result<NaiveTime, CellError>> {
    let caps = CLOCK_TIME_REGEX.captures(fragment.trim())?;
    let invalid = || CellError::InvalidClockTime {
        text: fragment.to_string(),
    };

    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if !(1..=12).contains(&hour) {
        return Some(Err(invalid()));
    }
    let pm = caps[3].eq_ignore_ascii_case("pm");
    let hour24 = hour % 12 + if pm { 12 } else { 0 };

    Some(NaiveTime::from_hms_opt(hour24, minute, 0).ok_or_else(invalid))
}

/// Combines a column date and a clock time into an instant in `tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
pub fn localize(
    date: NaiveDate,
    time: NaiveTime,
    tz: Tz,
) -> Result<DateTime<FixedOffset>, CellError> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or(CellError::NonexistentLocalTime { date, time })
}

/// Recognizes a fragment holding one or more `<int> hour(s)|hr(s)|min(s)` tokens.
///
/// Every `<int> <word>` pair in the fragment is summed; pairs with any other
/// unit word are reported in `skipped_units` rather than failing.
pub fn parse_duration(fragment: &str) -> Option<Result<DurationToken, CellError>> {
    if !DURATION_TOKEN_REGEX.is_match(fragment) {
        return None;
    }
    let overflow = || CellError::DurationOverflow {
        text: fragment.to_string(),
    };

    let mut total = TimeDelta::zero();
    let mut skipped_units = Vec::new();
    for caps in QUANTITY_REGEX.captures_iter(fragment) {
        let quantity: i64 = match caps[1].parse() {
            Ok(q) => q,
            Err(_) => return Some(Err(overflow())),
        };
        let delta = match DurationUnit::from_word(&caps[2]) {
            DurationUnit::Hours => TimeDelta::try_hours(quantity),
            DurationUnit::Minutes => TimeDelta::try_minutes(quantity),
            DurationUnit::Unknown(word) => {
                skipped_units.push(word);
                continue;
            }
        };
        match delta.and_then(|d| total.checked_add(&d)) {
            Some(sum) => total = sum,
            None => return Some(Err(overflow())),
        }
    }

    Some(Ok(DurationToken {
        total,
        skipped_units,
    }))
}
