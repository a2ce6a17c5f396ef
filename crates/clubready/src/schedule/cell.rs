//! Class cell parsing.
//!
//! A cell is read in two steps: [`CellSnapshot::from_element`] pulls the text
//! fragments and the booking/instructor controls out of the HTML, then
//! [`parse_cell`] runs the fragments through a small token state machine to
//! build a [`ClassRecord`].

use super::error::CellError;
use super::grammar::{localize, parse_clock_time, parse_duration, DurationToken};
use super::types::{has_passed, ClassRecord, TriState};
use super::ParseContext;
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// `title` of the control that starts a booking.
pub const BOOK_CLASS_TITLE: &str = "Book A Place In This Class";
/// `title` of the control shown on classes the user already booked.
pub const CHANGE_BOOKING_TITLE: &str = "You Are Booked - Change Booking";
/// Marker in the `href` of instructor bio links.
pub const INSTRUCTOR_BIO_MARKER: &str = "showbio";

static TITLED_CONTROL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[title], button[title], input[title]").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static OCCUPANCY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").unwrap());

const OCCUPANCY_PHRASE: &str = "spaces occupied";
const NAME_TRIM_CHARS: &[char] = &['-', '–', '—', ':', '|', ',', ';', '.', '*', '•'];

/// Everything the parser needs from one cell element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSnapshot {
    /// Whitespace-stripped, non-blank text nodes in document order, without
    /// the text inside the instructor link and the booking control
    pub fragments: Vec<String>,
    pub instructor: Option<String>,
    pub booking_id: Option<String>,
    pub booked: TriState,
}

impl CellSnapshot {
    /// Builds a snapshot from bare text fragments (no controls).
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Extracts text fragments, the instructor and the booking control from a cell.
    pub fn from_element(cell: &ElementRef) -> Self {
        let instructor_link = cell.select(&LINK_SELECTOR).find(|link| {
            link.value()
                .attr("href")
                .is_some_and(|href| href.to_lowercase().contains(INSTRUCTOR_BIO_MARKER))
        });
        let instructor = instructor_link
            .as_ref()
            .map(element_text)
            .filter(|name| !name.is_empty());

        let book_control = find_titled_control(cell, BOOK_CLASS_TITLE);
        let change_control = match book_control {
            Some(_) => None,
            None => find_titled_control(cell, CHANGE_BOOKING_TITLE),
        };
        let (booking_id, booked) = match (&book_control, &change_control) {
            (Some(control), _) => {
                let token = control.value().attr("onclick").map(str::to_string);
                let booked = token
                    .as_deref()
                    .map(infer_booked_from_token)
                    .unwrap_or_default();
                (token, booked)
            }
            (None, Some(control)) => {
                let token = control.value().attr("onclick").map(str::to_string);
                (token, TriState::True)
            }
            (None, None) => (None, TriState::Unknown),
        };

        // Text anywhere under the instructor link or the booking control is not class text.
        let excluded: Vec<_> = [instructor_link, book_control, change_control]
            .into_iter()
            .flatten()
            .map(|el| el.id())
            .collect();
        let fragments = cell
            .descendants()
            .filter(|node| !node.ancestors().any(|a| excluded.contains(&a.id())))
            .filter_map(|node| node.value().as_text().map(|text| text.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            fragments,
            instructor,
            booking_id,
            booked,
        }
    }
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn find_titled_control<'a>(cell: &ElementRef<'a>, title: &str) -> Option<ElementRef<'a>> {
    cell.select(&TITLED_CONTROL_SELECTOR).find(|control| {
        control
            .value()
            .attr("title")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(title))
    })
}

/// Guesses the booking state from the shape of a booking action token.
///
/// `selectClass(...)` starts a new booking, `showBooking(...)` opens an
/// existing one. Anything else stays unknown.
pub fn infer_booked_from_token(token: &str) -> TriState {
    let normalized: String = token
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if normalized.contains("selectclass") {
        TriState::False
    } else if normalized.contains("showbooking") {
        TriState::True
    } else {
        TriState::Unknown
    }
}

/// One classified text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    ClockTime(NaiveTime),
    Duration(DurationToken),
    Occupancy { registered: u32, class_size: u32 },
    Text(&'a str),
}

fn classify(fragment: &str) -> Result<Token<'_>, CellError> {
    if let Some(time) = parse_clock_time(fragment) {
        return time.map(Token::ClockTime);
    }
    if let Some(duration) = parse_duration(fragment) {
        return duration.map(Token::Duration);
    }
    if fragment.to_lowercase().contains(OCCUPANCY_PHRASE) {
        let malformed = || CellError::MalformedOccupancy {
            text: fragment.to_string(),
        };
        let caps = OCCUPANCY_REGEX.captures(fragment).ok_or_else(malformed)?;
        let registered = caps[1].parse().map_err(|_| malformed())?;
        let class_size = caps[2].parse().map_err(|_| malformed())?;
        return Ok(Token::Occupancy {
            registered,
            class_size,
        });
    }
    Ok(Token::Text(fragment))
}

/// Where the machine is in the usual time, duration, occupancy sequence.
///
/// Any state can see any token again; the state only decides whether plain
/// text still belongs to the class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellState {
    AwaitingTime,
    AwaitingDuration,
    AwaitingOccupancy,
}

struct CellMachine<'a> {
    date: NaiveDate,
    index: usize,
    state: CellState,
    start: Option<NaiveTime>,
    duration: Option<(&'a str, DurationToken)>,
    occupancy: Option<(u32, u32)>,
    name_parts: Vec<&'a str>,
    name: Option<String>,
}

impl<'a> CellMachine<'a> {
    fn new(date: NaiveDate, index: usize) -> Self {
        Self {
            date,
            index,
            state: CellState::AwaitingTime,
            start: None,
            duration: None,
            occupancy: None,
            name_parts: Vec::new(),
            name: None,
        }
    }

    fn feed(&mut self, fragment: &'a str, token: Token<'a>) {
        match token {
            Token::ClockTime(time) => {
                if let Some(first) = self.start {
                    warn!(
                        date = %self.date,
                        index = self.index,
                        kept = %first,
                        ignored = %fragment,
                        "Found more than one clock time in class cell"
                    );
                    return;
                }
                self.start = Some(time);
                if self.state == CellState::AwaitingTime {
                    self.state = CellState::AwaitingDuration;
                }
            }
            Token::Duration(duration) => {
                for unit in &duration.skipped_units {
                    warn!(
                        date = %self.date,
                        index = self.index,
                        unit = %unit,
                        "Unknown duration unit, skipping"
                    );
                }
                if self.duration.is_some() {
                    warn!(
                        date = %self.date,
                        index = self.index,
                        ignored = %fragment,
                        "Found more than one duration in class cell"
                    );
                    return;
                }
                self.duration = Some((fragment, duration));
                if !self.name_parts.is_empty() {
                    self.close_name();
                }
                self.state = CellState::AwaitingOccupancy;
            }
            Token::Occupancy {
                registered,
                class_size,
            } => {
                if self.occupancy.is_none() {
                    self.occupancy = Some((registered, class_size));
                }
            }
            Token::Text(text) => match self.state {
                CellState::AwaitingTime | CellState::AwaitingDuration => {
                    self.name_parts.push(text);
                }
                // A name that follows the duration is a single line.
                CellState::AwaitingOccupancy if self.name.is_none() => {
                    self.name_parts.push(text);
                    self.close_name();
                }
                CellState::AwaitingOccupancy => {}
            },
        }
    }

    fn close_name(&mut self) {
        let joined = self.name_parts.join(" ");
        self.name = Some(
            joined
                .trim_matches(|c: char| c.is_whitespace() || NAME_TRIM_CHARS.contains(&c))
                .to_string(),
        );
    }

    fn finish(mut self, snapshot: &CellSnapshot, ctx: &ParseContext) -> Result<ClassRecord, CellError> {
        if self.name.is_none() {
            self.close_name();
        }

        let start_time = self
            .start
            .map(|time| localize(self.date, time, ctx.timezone))
            .transpose()?;

        let end_time = match (&start_time, &self.duration) {
            (Some(start), Some((text, duration))) => Some(
                start
                    .checked_add_signed(duration.total)
                    .ok_or_else(|| CellError::DurationOverflow {
                        text: text.to_string(),
                    })?,
            ),
            (None, Some(_)) => {
                debug!(
                    date = %self.date,
                    index = self.index,
                    "Duration without a start time, leaving end time empty"
                );
                None
            }
            _ => None,
        };

        let (registered, class_size) = match self.occupancy {
            Some((registered, class_size)) => (Some(registered), Some(class_size)),
            None => (None, None),
        };
        let spots_available = match (registered, class_size) {
            (Some(registered), Some(class_size)) => TriState::from(registered < class_size),
            _ => TriState::Unknown,
        };

        let started = has_passed(start_time, ctx.now);
        let ended = has_passed(end_time, ctx.now);

        Ok(ClassRecord {
            class_name: self.name.unwrap_or_default(),
            start_time,
            end_time,
            duration_text: self.duration.map(|(text, _)| text.to_string()),
            instructor: snapshot.instructor.clone(),
            registered,
            class_size,
            spots_available,
            booking_id: snapshot.booking_id.clone(),
            booked: snapshot.booked,
            started,
            ended,
        })
    }
}

/// Parses one class cell into a record.
///
/// `date` is the cell's column date and `index` its position in the column;
/// both only appear in diagnostics.
pub fn parse_cell(
    snapshot: &CellSnapshot,
    date: NaiveDate,
    index: usize,
    ctx: &ParseContext,
) -> Result<ClassRecord, CellError> {
    let mut machine = CellMachine::new(date, index);

    for fragment in &snapshot.fragments {
        let token = classify(fragment)?;
        machine.feed(fragment, token);
    }

    machine.finish(snapshot, ctx)
}
