//! Deciding whether a matched class should be booked.

use crate::calendar::MatchOutcome;
use crate::schedule::{ClassRecord, TriState};
use std::fmt;
use tracing::{info, warn};

/// Why a matched class is not booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyBooked,
    /// The page showed no recognizable booking state
    BookingStateUnknown,
    NoBookingAffordance,
    AlreadyStarted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyBooked => "already booked",
            SkipReason::BookingStateUnknown => "booking state unknown",
            SkipReason::NoBookingAffordance => "no booking control",
            SkipReason::AlreadyStarted => "class already started",
        };
        f.write_str(text)
    }
}

/// Outcome of the booking decision for one matched class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingDecision {
    /// Book the class; `waitlist` is set when the class is full
    Book { waitlist: bool },
    Skip(SkipReason),
    /// Should be booked, but there is no session to do it with
    CannotBook,
}

impl BookingDecision {
    pub fn is_book(&self) -> bool {
        matches!(self, BookingDecision::Book { .. })
    }
}

impl fmt::Display for BookingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingDecision::Book { waitlist: false } => f.write_str("book"),
            BookingDecision::Book { waitlist: true } => f.write_str("join waitlist"),
            BookingDecision::Skip(reason) => write!(f, "skip ({reason})"),
            BookingDecision::CannotBook => f.write_str("cannot book (no session)"),
        }
    }
}

/// The browser session that performs the booking click sequence.
pub trait BookingSession {
    /// Books `class`, or joins its waitlist when `waitlist` is set.
    fn book(&mut self, class: &ClassRecord, waitlist: bool) -> anyhow::Result<()>;
}

/// Decides what to do with one matched class.
pub fn decide(class: &ClassRecord, has_session: bool) -> BookingDecision {
    match class.booked {
        TriState::True => return BookingDecision::Skip(SkipReason::AlreadyBooked),
        TriState::Unknown => return BookingDecision::Skip(SkipReason::BookingStateUnknown),
        TriState::False => {}
    }
    if class.booking_id.is_none() {
        return BookingDecision::Skip(SkipReason::NoBookingAffordance);
    }
    if class.started {
        return BookingDecision::Skip(SkipReason::AlreadyStarted);
    }
    if !has_session {
        return BookingDecision::CannotBook;
    }
    BookingDecision::Book {
        waitlist: class.spots_available.is_false(),
    }
}

/// A decision for one matched class, with what it was about.
#[derive(Debug, Clone)]
pub struct BookingReport<'a> {
    pub summary: &'a str,
    pub class: &'a ClassRecord,
    pub decision: BookingDecision,
    /// Set when the session was asked to book and failed
    pub error: Option<String>,
}

/// Decides every matched class and hands `Book` decisions to `session`.
///
/// With `dry_run` set every step runs except the call into the session.
pub fn book_matches<'a>(
    outcome: &MatchOutcome<'a>,
    mut session: Option<&mut dyn BookingSession>,
    dry_run: bool,
) -> Vec<BookingReport<'a>> {
    let mut reports = Vec::new();

    for (event, class) in outcome.pairs() {
        let decision = decide(class, session.is_some());
        let mut error = None;

        match decision {
            BookingDecision::Skip(SkipReason::BookingStateUnknown) => warn!(
                class = %class.class_name,
                start = ?class.start_time,
                "Not booking class with unknown booking state"
            ),
            BookingDecision::Skip(reason) => info!(
                class = %class.class_name,
                start = ?class.start_time,
                reason = %reason,
                "Not booking class"
            ),
            BookingDecision::CannotBook => warn!(
                class = %class.class_name,
                start = ?class.start_time,
                "No session at class booking time"
            ),
            BookingDecision::Book { waitlist } => {
                info!(
                    class = %class.class_name,
                    start = ?class.start_time,
                    waitlist = waitlist,
                    dry_run = dry_run,
                    "Booking class"
                );
                if !dry_run {
                    if let Some(session) = session.as_deref_mut() {
                        if let Err(e) = session.book(class, waitlist) {
                            warn!(class = %class.class_name, error = %e, "Booking failed");
                            error = Some(e.to_string());
                        }
                    }
                }
            }
        }

        reports.push(BookingReport {
            summary: &event.summary,
            class,
            decision,
            error,
        });
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{match_events, CalendarEvent, MatchOptions};
    use chrono::{TimeZone, Utc};

    fn bookable() -> ClassRecord {
        ClassRecord {
            class_name: "Spin".to_string(),
            start_time: Some(
                Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0)
                    .unwrap()
                    .fixed_offset(),
            ),
            end_time: None,
            duration_text: None,
            instructor: None,
            registered: Some(4),
            class_size: Some(10),
            spots_available: TriState::True,
            booking_id: Some("selectClass(9)".to_string()),
            booked: TriState::False,
            started: false,
            ended: false,
        }
    }

    #[derive(Default)]
    struct RecordingSession {
        booked: Vec<(String, bool)>,
    }

    impl BookingSession for RecordingSession {
        fn book(&mut self, class: &ClassRecord, waitlist: bool) -> anyhow::Result<()> {
            self.booked.push((class.class_name.clone(), waitlist));
            Ok(())
        }
    }

    #[test]
    fn test_decide_book() {
        assert_eq!(
            decide(&bookable(), true),
            BookingDecision::Book { waitlist: false }
        );
    }

    #[test]
    fn test_decide_waitlist_when_full() {
        let mut class = bookable();
        class.spots_available = TriState::False;
        assert_eq!(decide(&class, true), BookingDecision::Book { waitlist: true });
    }

    #[test]
    fn test_decide_skips() {
        let mut class = bookable();
        class.booked = TriState::True;
        assert_eq!(
            decide(&class, true),
            BookingDecision::Skip(SkipReason::AlreadyBooked)
        );

        class.booked = TriState::Unknown;
        assert_eq!(
            decide(&class, true),
            BookingDecision::Skip(SkipReason::BookingStateUnknown)
        );

        let mut class = bookable();
        class.booking_id = None;
        assert_eq!(
            decide(&class, true),
            BookingDecision::Skip(SkipReason::NoBookingAffordance)
        );

        let mut class = bookable();
        class.started = true;
        assert_eq!(
            decide(&class, true),
            BookingDecision::Skip(SkipReason::AlreadyStarted)
        );
    }

    #[test]
    fn test_decide_without_session() {
        assert_eq!(decide(&bookable(), false), BookingDecision::CannotBook);
    }

    #[test]
    fn test_book_matches_dispatches_to_session() {
        let class = bookable();
        let classes = vec![class.clone()];
        let events = vec![CalendarEvent::new("spin", class.start_time.unwrap())];
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
        let outcome = match_events(&events, &classes, &MatchOptions::new(now, 2));

        let mut session = RecordingSession::default();
        let reports = book_matches(&outcome, Some(&mut session), false);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].decision.is_book());
        assert_eq!(session.booked, vec![("Spin".to_string(), false)]);

        let mut session = RecordingSession::default();
        let reports = book_matches(&outcome, Some(&mut session), true);
        assert!(reports[0].decision.is_book());
        assert!(session.booked.is_empty());

        let reports = book_matches(&outcome, None, false);
        assert_eq!(reports[0].decision, BookingDecision::CannotBook);
    }
}
