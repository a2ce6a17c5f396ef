use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use clubready::booking::{book_matches, BookingDecision, SkipReason};
use clubready::calendar::{match_events, permitted_summaries, CalendarEvent, MatchOptions};
use clubready::schedule::cache::{load_serialized_class_table, serialize_class_table};
use clubready::schedule::{parse_class_table, ParseContext, TriState};

const WEEK_HTML: &str = include_str!("fixtures/week.html");

fn ctx() -> ParseContext {
    ParseContext {
        timezone: chrono_tz::America::New_York,
        now: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn eastern(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    chrono_tz::America::New_York
        .with_ymd_and_hms(2025, 3, day, hour, minute, 0)
        .unwrap()
        .fixed_offset()
}

#[test]
fn test_fixture_class_table() {
    let table = parse_class_table(WEEK_HTML, &ctx()).unwrap();

    let names: Vec<_> = table.iter().map(|c| c.class_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Boxing All Levels",
            "Spin",
            "Boxing All Levels",
            "Stretch",
            "Boxing All Levels"
        ]
    );

    let sunday = &table[0];
    assert_eq!(sunday.start_time, Some(eastern(2, 9, 0)));
    assert_eq!(sunday.end_time, Some(eastern(2, 10, 30)));
    assert_eq!(sunday.instructor.as_deref(), Some("Jane Doe"));
    assert_eq!(sunday.registered, Some(12));
    assert_eq!(sunday.class_size, Some(20));
    assert_eq!(sunday.spots_available, TriState::True);
    assert_eq!(
        sunday.booking_id.as_deref(),
        Some("selectClass(5001);return false;")
    );
    assert_eq!(sunday.booked, TriState::False);
    assert!(!sunday.started);

    let spin = &table[1];
    assert_eq!(spin.end_time, Some(eastern(3, 6, 45)));
    assert_eq!(spin.spots_available, TriState::False);

    let booked = &table[2];
    assert_eq!(booked.start_time, Some(eastern(3, 12, 15)));
    assert_eq!(booked.booked, TriState::True);
    assert_eq!(booked.instructor, None);

    let stretch = &table[3];
    assert_eq!(stretch.booking_id, None);
    assert_eq!(stretch.booked, TriState::Unknown);
    assert_eq!(stretch.spots_available, TriState::Unknown);

    let thursday = &table[4];
    assert_eq!(thursday.start_time, Some(eastern(6, 9, 0)));
    assert_eq!(thursday.booking_id.as_deref(), Some("openClass(5005)"));
    assert_eq!(thursday.booked, TriState::Unknown);
}

#[test]
fn test_fixture_survives_cache_round_trip() {
    let table = parse_class_table(WEEK_HTML, &ctx()).unwrap();
    let document = serialize_class_table(&table).unwrap();
    assert_eq!(load_serialized_class_table(&document).unwrap(), table);
}

#[test]
fn test_fixture_booking_plan() {
    let table = parse_class_table(WEEK_HTML, &ctx()).unwrap();
    let events = vec![
        CalendarEvent::new("boxing all levels", eastern(2, 9, 0)),
        CalendarEvent::new("spin", eastern(3, 6, 0)),
        CalendarEvent::new("Boxing All Levels", eastern(3, 12, 15)),
        CalendarEvent::new("Team Lunch", eastern(4, 12, 0)),
        CalendarEvent::new("boxing all levels", eastern(6, 9, 0)),
    ];
    let options = MatchOptions::new(ctx().now, 7).with_permitted(permitted_summaries(&table));
    let outcome = match_events(&events, &table, &options);
    assert_eq!(outcome.dropped.not_permitted, 1);

    let decisions: Vec<_> = book_matches(&outcome, None, true)
        .into_iter()
        .map(|r| (r.class.start_time, r.decision))
        .collect();
    assert_eq!(
        decisions,
        vec![
            (Some(eastern(2, 9, 0)), BookingDecision::CannotBook),
            (Some(eastern(3, 6, 0)), BookingDecision::CannotBook),
            (
                Some(eastern(3, 12, 15)),
                BookingDecision::Skip(SkipReason::AlreadyBooked)
            ),
            (
                Some(eastern(6, 9, 0)),
                BookingDecision::Skip(SkipReason::BookingStateUnknown)
            ),
        ]
    );
}

#[test]
fn test_fixture_bookable_range_limits_matches() {
    let table = parse_class_table(WEEK_HTML, &ctx()).unwrap();
    let events = vec![
        CalendarEvent::new("boxing all levels", eastern(2, 9, 0)),
        CalendarEvent::new("boxing all levels", eastern(6, 9, 0)),
    ];
    let outcome = match_events(&events, &table, &MatchOptions::new(ctx().now, 2));
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.dropped.beyond_range, 1);
}
