//! The calendar document
//!
//! A [`CalendarState`] is the whole dataset of a calendar. It is built once (either fresh, or decoded from a
//! fragment by the [`codec`](crate::codec)), then edited in place. Every mutator keeps the document's invariants:
//! color indices always point into the palette, and the compared time zones never contain duplicates nor the home zone.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::config::{
    default_language, DEFAULT_COLORS, DEFAULT_COMPARED_ZONE, DEFAULT_RECURRENCE_WINDOW_DAYS, DEFAULT_TITLE,
    MAX_COMPARED_ZONES, MAX_PALETTE_SIZE, MAX_RECURRENCE_WINDOW_DAYS, MAX_TITLE_LENGTH, SUPPORTED_LANGUAGES,
};
use crate::error::CalendarError;
use crate::event::EventRecord;

/// The full calendar document
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarState {
    title: String,
    palette: Vec<String>,
    events: Vec<EventRecord>,
    settings: Settings,
    planner: PlannerState,
}

impl Default for CalendarState {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            palette: DEFAULT_COLORS.clone(),
            events: Vec::new(),
            settings: Settings::default(),
            planner: PlannerState::default(),
        }
    }
}

impl CalendarState {
    /// A fresh, never-edited document
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a document from parts that have already been validated
    pub(crate) fn from_parts(title: String, palette: Vec<String>, events: Vec<EventRecord>, settings: Settings, planner: PlannerState) -> Self {
        Self { title, palette, events, settings, planner }
    }

    pub fn title(&self) -> &str                   { &self.title }
    pub fn palette(&self) -> &[String]            { &self.palette }
    pub fn events(&self) -> &[EventRecord]        { &self.events }
    pub fn settings(&self) -> &Settings           { &self.settings }
    pub fn settings_mut(&mut self) -> &mut Settings { &mut self.settings }
    pub fn planner(&self) -> &PlannerState        { &self.planner }
    pub fn planner_mut(&mut self) -> &mut PlannerState { &mut self.planner }

    /// Rename the calendar. Titles longer than the limit are truncated
    pub fn set_title(&mut self, title: &str) {
        self.title = clean_title(title);
    }

    /// Whether this document holds anything worth keeping in a URL
    pub fn has_stored_data(&self) -> bool {
        !self.events.is_empty()
            || self.planner.compared_zones.len() > 1
            || self.settings.read_only
            || self.settings.notifications
    }

    /// Append an event, and return its index.
    ///
    /// An out-of-palette color index is clamped to the last palette entry
    pub fn add_event(&mut self, mut event: EventRecord) -> usize {
        self.clamp_color(&mut event);
        self.events.push(event);
        self.events.len() - 1
    }

    /// Replace the event at `index`
    pub fn replace_event(&mut self, index: usize, mut event: EventRecord) -> Result<(), CalendarError> {
        self.clamp_color(&mut event);
        match self.events.get_mut(index) {
            None => Err(CalendarError::NoSuchEvent(index)),
            Some(slot) => {
                *slot = event;
                Ok(())
            },
        }
    }

    /// Remove the event at `index`. Later events shift down by one.
    pub fn remove_event(&mut self, index: usize) -> Result<EventRecord, CalendarError> {
        if index >= self.events.len() {
            return Err(CalendarError::NoSuchEvent(index));
        }
        Ok(self.events.remove(index))
    }

    /// Remove every event, but keep the rest of the document
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Find the palette entry for this color (case-insensitive), or append it as a custom color
    pub fn color_index_for(&mut self, color: &str) -> Result<usize, CalendarError> {
        let color = canonical_color(color).ok_or_else(|| CalendarError::InvalidColor(color.to_string()))?;
        if let Some(index) = self.palette.iter().position(|c| c.eq_ignore_ascii_case(&color)) {
            return Ok(index);
        }
        if self.palette.len() >= MAX_PALETTE_SIZE {
            return Err(CalendarError::PaletteFull);
        }
        self.palette.push(color);
        Ok(self.palette.len() - 1)
    }

    /// Change the color of a palette slot
    pub fn set_palette_color(&mut self, index: usize, color: &str) -> Result<(), CalendarError> {
        let color = canonical_color(color).ok_or_else(|| CalendarError::InvalidColor(color.to_string()))?;
        match self.palette.get_mut(index) {
            None => Err(CalendarError::InvalidColor(format!("no palette slot {}", index))),
            Some(slot) => {
                *slot = color;
                Ok(())
            },
        }
    }

    fn clamp_color(&self, event: &mut EventRecord) {
        let last = self.palette.len().saturating_sub(1);
        if event.color_index() > last {
            log::debug!("Clamping color index {} of event {:?} to {}", event.color_index(), event.title(), last);
            event.set_color_index(last);
        }
    }
}

pub(crate) fn clean_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_LENGTH).collect()
}

/// Turns `#ABC`, `abc`, `#aabbcc`... into the canonical `#aabbcc` form.
///
/// Only 3- and 6-digit hex notations are accepted, other CSS color syntaxes are not.
pub fn canonical_color(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if !(hex.len() == 3 || hex.len() == 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    csscolorparser::parse(&format!("#{}", hex))
        .ok()
        .map(|color| color.to_hex_string())
}



/// The views the front-end can show
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
    Day,
    Week,
    Month,
    Year,
    Agenda,
    Timeline,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Day => "day",
            View::Week => "week",
            View::Month => "month",
            View::Year => "year",
            View::Agenda => "agenda",
            View::Timeline => "timeline",
        }
    }
}

impl Default for View {
    fn default() -> Self {
        View::Month
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(View::Day),
            "week" => Ok(View::Week),
            "month" => Ok(View::Month),
            "year" => Ok(View::Year),
            "agenda" => Ok(View::Agenda),
            "timeline" => Ok(View::Timeline),
            other => Err(format!("unknown view {:?}", other)),
        }
    }
}

impl Display for View {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}



/// User preferences stored along with the document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    dark_theme: bool,
    week_starts_monday: bool,
    read_only: bool,
    notifications: bool,
    view: View,
    language: String,
    recurrence_window_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_theme: false,
            week_starts_monday: false,
            read_only: false,
            notifications: false,
            view: View::default(),
            language: default_language().to_string(),
            recurrence_window_days: DEFAULT_RECURRENCE_WINDOW_DAYS,
        }
    }
}

impl Settings {
    pub fn dark_theme(&self) -> bool              { self.dark_theme }
    pub fn week_starts_monday(&self) -> bool      { self.week_starts_monday }
    pub fn read_only(&self) -> bool               { self.read_only }
    pub fn notifications(&self) -> bool           { self.notifications }
    pub fn view(&self) -> View                    { self.view }
    pub fn language(&self) -> &str                { &self.language }
    pub fn recurrence_window_days(&self) -> u32   { self.recurrence_window_days }

    pub fn set_dark_theme(&mut self, value: bool)         { self.dark_theme = value; }
    pub fn set_week_starts_monday(&mut self, value: bool) { self.week_starts_monday = value; }
    pub fn set_read_only(&mut self, value: bool)          { self.read_only = value; }
    pub fn set_notifications(&mut self, value: bool)      { self.notifications = value; }
    pub fn set_view(&mut self, view: View)                { self.view = view; }

    /// Unsupported languages fall back to the default one
    pub fn set_language(&mut self, code: &str) {
        self.language = if SUPPORTED_LANGUAGES.contains(&code) {
            code.to_string()
        } else {
            default_language().to_string()
        };
    }

    /// The window is clamped to `1..=MAX_RECURRENCE_WINDOW_DAYS`
    pub fn set_recurrence_window_days(&mut self, days: u32) {
        self.recurrence_window_days = days.clamp(1, MAX_RECURRENCE_WINDOW_DAYS);
    }
}



/// State of the world-clock planner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannerState {
    home_zone: Option<String>,
    compared_zones: Vec<String>,
    selected_timestamp: Option<i64>,
    reference_date: Option<NaiveDate>,
    use_24_hour_format: bool,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self {
            home_zone: None,
            compared_zones: vec![DEFAULT_COMPARED_ZONE.to_string()],
            selected_timestamp: None,
            reference_date: None,
            use_24_hour_format: false,
        }
    }
}

impl PlannerState {
    pub fn home_zone(&self) -> Option<&str>        { self.home_zone.as_deref() }
    pub fn compared_zones(&self) -> &[String]      { &self.compared_zones }
    /// Milliseconds since the Unix epoch
    pub fn selected_timestamp(&self) -> Option<i64> { self.selected_timestamp }
    pub fn reference_date(&self) -> Option<NaiveDate> { self.reference_date }
    pub fn use_24_hour_format(&self) -> bool       { self.use_24_hour_format }

    pub fn set_selected_timestamp(&mut self, timestamp_ms: Option<i64>) { self.selected_timestamp = timestamp_ms; }
    pub fn set_reference_date(&mut self, date: Option<NaiveDate>)       { self.reference_date = date; }
    pub fn set_24_hour_format(&mut self, value: bool)                   { self.use_24_hour_format = value; }

    /// Set the home zone. It is removed from the compared zones if it was there.
    pub fn set_home_zone(&mut self, zone: &str) -> Result<(), CalendarError> {
        if !is_valid_zone(zone) {
            return Err(CalendarError::InvalidZone(zone.to_string()));
        }
        self.compared_zones.retain(|z| z != zone);
        self.home_zone = Some(zone.to_string());
        Ok(())
    }

    /// Add a zone to compare with. Adding the home zone or an already compared zone does nothing.
    pub fn add_compared_zone(&mut self, zone: &str) -> Result<(), CalendarError> {
        let zone = zone.trim();
        if !is_valid_zone(zone) {
            return Err(CalendarError::InvalidZone(zone.to_string()));
        }
        if self.home_zone.as_deref() == Some(zone) || self.compared_zones.iter().any(|z| z == zone) {
            return Ok(());
        }
        if self.compared_zones.len() >= MAX_COMPARED_ZONES {
            return Err(CalendarError::TooManyZones);
        }
        self.compared_zones.push(zone.to_string());
        Ok(())
    }

    /// Returns whether the zone was compared
    pub fn remove_compared_zone(&mut self, zone: &str) -> bool {
        let before = self.compared_zones.len();
        self.compared_zones.retain(|z| z != zone);
        before != self.compared_zones.len()
    }

    /// Make a compared zone the home zone. The previous home zone (if any) becomes the first compared zone.
    pub fn promote_zone(&mut self, zone: &str) -> Result<(), CalendarError> {
        if !self.compared_zones.iter().any(|z| z == zone) {
            return Err(CalendarError::InvalidZone(zone.to_string()));
        }
        self.compared_zones.retain(|z| z != zone);
        if let Some(old_home) = self.home_zone.take() {
            self.compared_zones.insert(0, old_home);
        }
        self.home_zone = Some(zone.to_string());
        Ok(())
    }

    /// Assemble a planner from already cleaned parts, restoring its invariants
    pub(crate) fn from_parts(home_zone: Option<String>, zones: Vec<String>, selected_timestamp: Option<i64>,
                             reference_date: Option<NaiveDate>, use_24_hour_format: bool) -> Self
    {
        let mut compared_zones: Vec<String> = Vec::new();
        for zone in zones {
            if home_zone.as_ref() == Some(&zone) || compared_zones.contains(&zone) {
                continue;
            }
            if compared_zones.len() >= MAX_COMPARED_ZONES {
                log::debug!("Dropping compared zone {} (too many zones)", zone);
                continue;
            }
            compared_zones.push(zone);
        }
        Self { home_zone, compared_zones, selected_timestamp, reference_date, use_24_hour_format }
    }
}

/// Whether this is an IANA time zone name (or plain `UTC`)
pub fn is_valid_zone(zone: &str) -> bool {
    zone == "UTC" || zone.parse::<chrono_tz::Tz>().is_ok()
}
