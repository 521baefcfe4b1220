//! Calendar events, as they are stored in a document

use std::fmt::{Display, Formatter};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_EVENT_TITLE_LENGTH, MS_PER_MINUTE, UNTITLED_EVENT};

/// How an event repeats.
///
/// Only four periods exist. Anything else found in a document is not a recurrence rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceRule {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A recurrence code that is not one of `d`, `w`, `m`, `y`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownRecurrenceCode(pub String);

impl RecurrenceRule {
    /// Parse a wire code. The empty code means "does not repeat".
    pub fn from_code(code: &str) -> Result<Self, UnknownRecurrenceCode> {
        match code {
            "" => Ok(RecurrenceRule::None),
            "d" => Ok(RecurrenceRule::Daily),
            "w" => Ok(RecurrenceRule::Weekly),
            "m" => Ok(RecurrenceRule::Monthly),
            "y" => Ok(RecurrenceRule::Yearly),
            other => Err(UnknownRecurrenceCode(other.to_string())),
        }
    }

    /// The wire code, or `None` for non-recurring events (they carry no code at all)
    pub fn code(&self) -> Option<&'static str> {
        match self {
            RecurrenceRule::None => None,
            RecurrenceRule::Daily => Some("d"),
            RecurrenceRule::Weekly => Some("w"),
            RecurrenceRule::Monthly => Some("m"),
            RecurrenceRule::Yearly => Some("y"),
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceRule::None
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        RecurrenceRule::None
    }
}

impl Display for RecurrenceRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceRule::None => write!(f, "once"),
            RecurrenceRule::Daily => write!(f, "daily"),
            RecurrenceRule::Weekly => write!(f, "weekly"),
            RecurrenceRule::Monthly => write!(f, "monthly"),
            RecurrenceRule::Yearly => write!(f, "yearly"),
        }
    }
}



/// One (possibly recurring) event, as persisted in a document
///
/// `duration_minutes == 0` means an all-day event: it occupies the whole calendar day that contains its start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    start_minute: i64,
    duration_minutes: u32,
    title: String,
    color_index: usize,
    recurrence: RecurrenceRule,
}

impl EventRecord {
    /// Create an event. The title is trimmed to its maximum length, and an empty title becomes "Untitled".
    ///
    /// Note that `color_index` is not checked here: the palette it refers to belongs to the document,
    /// see [`CalendarState::add_event`](crate::CalendarState::add_event).
    pub fn new(start_minute: i64, duration_minutes: u32, title: &str, color_index: usize, recurrence: RecurrenceRule) -> Self {
        Self {
            start_minute,
            duration_minutes,
            title: clean_event_title(title),
            color_index,
            recurrence,
        }
    }

    /// Create a timed event starting at `start`
    pub fn timed<Tz: TimeZone>(start: &DateTime<Tz>, duration_minutes: u32, title: &str) -> Self {
        Self::new(minutes_since_epoch(start), duration_minutes, title, 0, RecurrenceRule::None)
    }

    /// Create an all-day event on the day that contains `start`
    pub fn all_day<Tz: TimeZone>(start: &DateTime<Tz>, title: &str) -> Self {
        Self::new(minutes_since_epoch(start), 0, title, 0, RecurrenceRule::None)
    }

    pub fn with_color(mut self, color_index: usize) -> Self {
        self.color_index = color_index;
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceRule) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn start_minute(&self) -> i64           { self.start_minute }
    pub fn duration_minutes(&self) -> u32       { self.duration_minutes }
    pub fn title(&self) -> &str                 { &self.title }
    pub fn color_index(&self) -> usize          { self.color_index }
    pub fn recurrence(&self) -> RecurrenceRule  { self.recurrence }

    pub fn is_all_day(&self) -> bool {
        self.duration_minutes == 0
    }

    /// The start of this event as a UTC instant.
    ///
    /// Returns `None` for minute counts outside of what `chrono` can represent
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start_minute
            .checked_mul(MS_PER_MINUTE)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub(crate) fn set_color_index(&mut self, color_index: usize) {
        self.color_index = color_index;
    }
}

/// Whole minutes since the Unix epoch (rounded down, like the front-end does)
pub fn minutes_since_epoch<Tz: TimeZone>(instant: &DateTime<Tz>) -> i64 {
    instant.timestamp_millis().div_euclid(MS_PER_MINUTE)
}

pub(crate) fn clean_event_title(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return UNTITLED_EVENT.to_string();
    }
    title.chars().take(MAX_EVENT_TITLE_LENGTH).collect()
}



/// A concrete, dated instance of an [`EventRecord`].
///
/// These are computed for a given time window, and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub color_index: usize,
    pub is_all_day: bool,
    /// Position of the originating record in the document's event list
    pub source_index: usize,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrence_codes() {
        assert_eq!(RecurrenceRule::from_code("w"), Ok(RecurrenceRule::Weekly));
        assert_eq!(RecurrenceRule::from_code(""), Ok(RecurrenceRule::None));
        assert_eq!(RecurrenceRule::from_code("x"), Err(UnknownRecurrenceCode("x".to_string())));
        assert_eq!(RecurrenceRule::Yearly.code(), Some("y"));
        assert_eq!(RecurrenceRule::None.code(), None);
    }

    #[test]
    fn titles_are_cleaned() {
        let ev = EventRecord::new(0, 30, "   ", 0, RecurrenceRule::None);
        assert_eq!(ev.title(), "Untitled");

        let long = "é".repeat(200);
        let ev = EventRecord::new(0, 30, &long, 0, RecurrenceRule::None);
        assert_eq!(ev.title().chars().count(), MAX_EVENT_TITLE_LENGTH);
    }

    #[test]
    fn minutes_are_floored() {
        let before_epoch = Utc.timestamp_millis_opt(-30_000).unwrap();
        assert_eq!(minutes_since_epoch(&before_epoch), -1);

        let ev = EventRecord::timed(&Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), 60, "Standup");
        assert_eq!(ev.start(), Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        assert!(!ev.is_all_day());
    }
}
