//! Reconciles a ClubReady weekly class schedule with planned workouts in a
//! personal calendar.
//!
//! The crate is pure data in, data out: callers hand it an already fetched
//! schedule page and an already fetched event list, and get back class
//! records, matches and booking decisions. Driving the browser and talking to
//! the calendar API are left to the caller.

pub mod booking;
pub mod calendar;
pub mod config;
pub mod schedule;

pub use booking::{book_matches, decide, BookingDecision, BookingSession, SkipReason};
pub use calendar::{match_events, CalendarEvent, MatchOptions, MatchOutcome, MatchResult};
pub use config::{Config, ConfigLayer};
pub use schedule::{parse_class_table, ClassRecord, ParseContext, TriState};
