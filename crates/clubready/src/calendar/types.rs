/// Calendar event types, shaped like the Google Calendar events list API
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Event status that removes an event from consideration.
pub const CANCELLED_STATUS: &str = "cancelled";

/// Body of an events list call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
}

/// A planned workout in the personal calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Class name as written in the calendar
    #[serde(default)]
    pub summary: String,
    /// A missing status counts as cancelled
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: EventTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    /// Set for timed events
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<DateTime<FixedOffset>>,
    /// Set for all-day events
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "timeZone", default)]
    pub time_zone: Option<String>,
}

impl CalendarEvent {
    /// Creates a confirmed timed event.
    pub fn new(summary: impl Into<String>, start: DateTime<FixedOffset>) -> Self {
        Self {
            summary: summary.into(),
            status: Some("confirmed".to_string()),
            start: EventTime {
                date_time: Some(start),
                ..EventTime::default()
            },
        }
    }

    /// Start instant, if this is a timed event.
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.start.date_time
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == CANCELLED_STATUS)
    }
}
