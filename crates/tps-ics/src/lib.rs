//! iCalendar wire format boundary.
//!
//! A deliberately tolerant reader and a strict writer for the subset of
//! RFC 5545 the timetable feed actually uses: VEVENT blocks with UID,
//! SUMMARY, LOCATION, DESCRIPTION and DTSTART/DTEND. Everything else in the
//! feed (VTIMEZONE blocks, alarms, unknown properties) is skipped.
//!
//! # Timestamp resolution
//!
//! `...Z` values are UTC. Values carrying a `TZID` parameter resolve in that
//! zone. Floating values resolve in the caller's default zone, and date-only
//! values become local midnight. Ambiguous local times (DST fall-back) take
//! the earlier candidate; nonexistent ones (spring-forward gap) are shifted
//! past the gap.

mod parse;
mod write;

pub use parse::parse_calendar;
pub use write::write_calendar;

use thiserror::Error;

/// Errors reading an iCalendar document.
#[derive(Debug, Error)]
pub enum IcsError {
    /// The text does not contain a VCALENDAR at all.
    #[error("not an iCalendar document")]
    NotCalendar,
    /// A VEVENT block was opened but never closed.
    #[error("unterminated VEVENT block")]
    UnterminatedEvent,
    /// A VEVENT was missing a required property.
    #[error("event {uid:?} is missing {property}")]
    MissingProperty { uid: String, property: &'static str },
    /// A datetime value could not be parsed.
    #[error("invalid datetime {value:?} for {property}")]
    BadDateTime { property: &'static str, value: String },
    /// A TZID parameter named an unknown timezone.
    #[error("unknown timezone id {tzid:?}")]
    UnknownTzid { tzid: String },
}
