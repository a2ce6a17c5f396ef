/// Weekly class schedule extraction
pub mod cache;
pub mod cell;
mod error;
pub mod grammar;
mod types;

pub use cell::{parse_cell, CellSnapshot};
pub use error::{CacheError, CellError, ScheduleError};
pub use types::*;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Selector for the header holding the visible week's date span.
pub const WEEK_RANGE_SELECTOR: &str = "#weekrange";
/// Selector for the row whose children are the per-date columns.
pub const SCHEDULE_ROW_SELECTOR: &str = "#scheduleRow";
/// Selector for the cell container inside one column.
pub const COLUMN_BODY_SELECTOR: &str = "td";

static WEEK_RANGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(WEEK_RANGE_SELECTOR).unwrap());
static SCHEDULE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(SCHEDULE_ROW_SELECTOR).unwrap());
static COLUMN_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(COLUMN_BODY_SELECTOR).unwrap());
static WEEK_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})/(\d{1,2})/(\d{4})\s*-\s*(\d{1,2})/(\d{1,2})/(\d{4})\s*$").unwrap()
});

/// Settings shared by every cell of one extraction pass.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    /// Timezone the schedule's clock times are written in
    pub timezone: Tz,
    /// Reference instant for `started`/`ended`
    pub now: DateTime<Utc>,
}

impl ParseContext {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            now: Utc::now(),
        }
    }
}

/// Parses header text like `3/2/2025 - 3/9/2025`.
pub fn parse_week_span(text: &str) -> Result<WeekSpan, ScheduleError> {
    let invalid = || ScheduleError::InvalidWeekSpan {
        text: text.to_string(),
    };
    let caps = WEEK_SPAN_REGEX.captures(text).ok_or_else(invalid)?;
    let date_at = |i: usize| -> Result<NaiveDate, ScheduleError> {
        let month = caps[i].parse().map_err(|_| invalid())?;
        let day = caps[i + 1].parse().map_err(|_| invalid())?;
        let year = caps[i + 2].parse().map_err(|_| invalid())?;
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
    };

    let start = date_at(1)?;
    let end = date_at(4)?;
    if start >= end {
        return Err(ScheduleError::WeekSpanOrder { start, end });
    }
    Ok(WeekSpan { start, end })
}

/// Parses every cell of one column, dropping cells that fail.
pub fn parse_column(
    date: NaiveDate,
    cells: &[CellSnapshot],
    ctx: &ParseContext,
) -> Vec<ClassRecord> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(index, snapshot)| match parse_cell(snapshot, date, index, ctx) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    date = %date,
                    index = index,
                    error = %e,
                    "Skipping class cell that failed to parse"
                );
                None
            }
        })
        .collect()
}

/// Direct element children of `element`, in document order.
fn child_elements<'a>(element: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap).collect()
}

/// Reads the week span and the column elements from a schedule page.
fn schedule_columns<'a>(document: &'a Html) -> Result<(WeekSpan, Vec<ElementRef<'a>>), ScheduleError> {
    let header = document
        .select(&WEEK_RANGE)
        .next()
        .ok_or(ScheduleError::MissingElement {
            selector: WEEK_RANGE_SELECTOR,
        })?;
    let span = parse_week_span(&header.text().collect::<String>())?;

    let row = document
        .select(&SCHEDULE_ROW)
        .next()
        .ok_or(ScheduleError::MissingElement {
            selector: SCHEDULE_ROW_SELECTOR,
        })?;
    let columns = child_elements(&row);

    if span.len() != columns.len() {
        return Err(ScheduleError::ColumnMismatch {
            span,
            dates: span.len(),
            columns: columns.len(),
        });
    }
    Ok((span, columns))
}

/// Takes snapshots of every class cell in a column.
///
/// Cells are the direct `div` children of the column's first `td`.
fn column_cells(column: &ElementRef) -> Vec<CellSnapshot> {
    let Some(body) = column.select(&COLUMN_BODY).next() else {
        return Vec::new();
    };
    child_elements(&body)
        .iter()
        .filter(|el| el.value().name() == "div")
        .map(CellSnapshot::from_element)
        .collect()
}

/// Extracts every class in a weekly schedule page.
///
/// Records come out in column order, then cell order. A cell that fails to
/// parse is logged and left out; a page whose structure does not match the
/// expected layout is an error.
///
/// # Arguments
/// * `html` - Page source of the weekly class schedule
/// * `ctx` - Timezone and reference time
///
/// # Returns
/// * `Ok(Vec<ClassRecord>)` - All parsed classes
/// * `Err(ScheduleError)` - If the week span or columns cannot be read
pub fn parse_class_table(html: &str, ctx: &ParseContext) -> Result<Vec<ClassRecord>, ScheduleError> {
    let document = Html::parse_document(html);
    parse_class_document(&document, ctx)
}

/// Same as [`parse_class_table`] on an already parsed document.
pub fn parse_class_document(
    document: &Html,
    ctx: &ParseContext,
) -> Result<Vec<ClassRecord>, ScheduleError> {
    let (span, columns) = schedule_columns(document)?;

    let mut class_table = Vec::new();
    for (date, column) in span.dates().into_iter().zip(columns.iter()) {
        let cells = column_cells(column);
        class_table.extend(parse_column(date, &cells, ctx));
    }

    info!(
        span = %span,
        classes = class_table.len(),
        "Parsed class table"
    );
    Ok(class_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> ParseContext {
        ParseContext {
            timezone: chrono_tz::America::New_York,
            now: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_span_enumeration() {
        let span = parse_week_span("03/02/2025 - 03/09/2025").unwrap();
        let dates = span.dates();
        assert_eq!(dates.len(), 8);
        assert_eq!(span.len(), 8);
        assert_eq!(dates.first(), Some(&ymd(2025, 3, 2)));
        assert_eq!(dates.last(), Some(&ymd(2025, 3, 9)));
    }

    #[test]
    fn test_week_span_year_rollover() {
        let span = parse_week_span("12/30/2025 - 1/2/2026").unwrap();
        assert_eq!(
            span.dates(),
            vec![
                ymd(2025, 12, 30),
                ymd(2025, 12, 31),
                ymd(2026, 1, 1),
                ymd(2026, 1, 2)
            ]
        );
    }

    #[test]
    fn test_week_span_month_rollover() {
        let span = parse_week_span("2/27/2024 - 3/1/2024").unwrap();
        assert_eq!(
            span.dates(),
            vec![ymd(2024, 2, 27), ymd(2024, 2, 28), ymd(2024, 2, 29), ymd(2024, 3, 1)]
        );
    }

    #[test]
    fn test_week_span_must_increase() {
        assert!(matches!(
            parse_week_span("3/9/2025 - 3/2/2025"),
            Err(ScheduleError::WeekSpanOrder { .. })
        ));
        assert!(matches!(
            parse_week_span("3/2/2025 - 3/2/2025"),
            Err(ScheduleError::WeekSpanOrder { .. })
        ));
    }

    #[test]
    fn test_week_span_malformed() {
        for text in ["", "March 2 - March 9", "3/2/2025", "13/40/2025 - 3/9/2025"] {
            assert!(
                matches!(parse_week_span(text), Err(ScheduleError::InvalidWeekSpan { .. })),
                "{text:?} should not parse"
            );
        }
    }

    #[test]
    fn test_column_isolates_bad_cell() {
        let date = ymd(2025, 3, 3);
        let cells: Vec<CellSnapshot> = (0..5)
            .map(|i| {
                if i == 2 {
                    CellSnapshot::from_fragments(["9:99 AM", "Broken", "1 hour"])
                } else {
                    CellSnapshot::from_fragments([
                        format!("{}:00 AM", i + 6),
                        format!("Class {i}"),
                        "1 hour".to_string(),
                    ])
                }
            })
            .collect();

        let records = parse_column(date, &cells, &ctx());
        let names: Vec<_> = records.iter().map(|r| r.class_name.as_str()).collect();
        assert_eq!(names, vec!["Class 0", "Class 1", "Class 3", "Class 4"]);
    }

    fn page(span: &str, columns: &[&str]) -> String {
        let cols: String = columns
            .iter()
            .map(|cells| format!("<td><table><tr><td>{cells}</td></tr></table></td>"))
            .collect();
        format!(
            r#"<html><body><span id="weekrange">{span}</span>
            <table><tr id="scheduleRow">{cols}</tr></table></body></html>"#
        )
    }

    #[test]
    fn test_column_count_mismatch_is_fatal() {
        let html = page("3/2/2025 - 3/4/2025", &["", ""]);
        match parse_class_table(&html, &ctx()) {
            Err(ScheduleError::ColumnMismatch { dates, columns, .. }) => {
                assert_eq!(dates, 3);
                assert_eq!(columns, 2);
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let err = parse_class_table("<html><body></body></html>", &ctx()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::MissingElement {
                selector: WEEK_RANGE_SELECTOR
            }
        ));
        assert!(err.is_layout_change());
    }

    #[test]
    fn test_columns_pair_with_dates() {
        let html = page(
            "3/2/2025 - 3/3/2025",
            &[
                "<div>8:00 AM<br>Spin<br>45 mins</div>",
                "<div>9:00 AM<br>Yoga<br>1 hour</div><div>bad<br>spaces occupied</div><div>5:00 PM<br>HIIT<br>30 mins</div>",
            ],
        );
        let records = parse_class_table(&html, &ctx()).unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.class_name.as_str(), r.start_time.map(|t| t.date_naive())))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Spin", Some(ymd(2025, 3, 2))),
                ("Yoga", Some(ymd(2025, 3, 3))),
                ("HIIT", Some(ymd(2025, 3, 3))),
            ]
        );
    }
}
