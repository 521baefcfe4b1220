//! The compacted wire form of a document
//!
//! This is the only place where the positional, sparse shapes of the URL format exist.
//! Keys: `t` title, `c` palette diff, `e` event tuples, `s` settings diff, `mp` planner diff.
//! Anything equal to its default is left out, so that a fresh document compacts to `{}`.

use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::config::{DEFAULT_COLORS, DEFAULT_TITLE};
use crate::event::EventRecord;
use crate::state::{CalendarState, PlannerState, Settings};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CompactState {
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Palette index -> hex color without its leading `#`
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub palette: Option<BTreeMap<usize, String>>,
    #[serde(rename = "e", skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<WireEvent>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsDiff>,
    #[serde(rename = "mp", skip_serializing_if = "Option::is_none")]
    pub planner: Option<PlannerDiff>,
}

impl CompactState {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.palette.is_none()
            && self.events.is_empty()
            && self.settings.is_none()
            && self.planner.is_none()
    }
}

/// `[startMinute, durationMinutes, title, colorIndex?, rule?]`
///
/// The color index is written when it is not `0`, or when a rule follows it (so that the tuple stays positional).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireEvent {
    pub start_minute: i64,
    pub duration_minutes: u32,
    pub title: String,
    pub color_index: Option<usize>,
    pub rule: Option<&'static str>,
}

impl From<&EventRecord> for WireEvent {
    fn from(event: &EventRecord) -> Self {
        let rule = event.recurrence().code();
        let color_index = match (rule, event.color_index()) {
            (None, 0) => None,
            (_, index) => Some(index),
        };
        Self {
            start_minute: event.start_minute(),
            duration_minutes: event.duration_minutes(),
            title: event.title().to_string(),
            color_index,
            rule,
        }
    }
}

impl Serialize for WireEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 3 + self.color_index.map_or(0, |_| 1) + self.rule.map_or(0, |_| 1);
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.start_minute)?;
        seq.serialize_element(&self.duration_minutes)?;
        seq.serialize_element(&self.title)?;
        if let Some(index) = self.color_index {
            seq.serialize_element(&index)?;
        }
        if let Some(rule) = self.rule {
            seq.serialize_element(rule)?;
        }
        seq.end()
    }
}

/// Flags are written as `1`, the way the front-end has always stored them
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SettingsDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlannerDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f24: Option<bool>,
}

/// Strip everything that can be recovered from the defaults
pub fn compact(state: &CalendarState) -> CompactState {
    let title = if state.title() != DEFAULT_TITLE {
        Some(state.title().to_string())
    } else {
        None
    };

    CompactState {
        title,
        palette: palette_diff(state.palette()),
        events: state.events().iter().map(WireEvent::from).collect(),
        settings: settings_diff(state.settings()),
        planner: planner_diff(state.planner()),
    }
}

fn palette_diff(palette: &[String]) -> Option<BTreeMap<usize, String>> {
    let diff: BTreeMap<usize, String> = palette.iter()
        .enumerate()
        .filter(|(index, color)| DEFAULT_COLORS.get(*index) != Some(*color))
        .map(|(index, color)| (index, color.trim_start_matches('#').to_string()))
        .collect();

    if diff.is_empty() { None } else { Some(diff) }
}

fn flag(value: bool, default: bool) -> Option<u8> {
    if value == default { None } else { Some(value as u8) }
}

fn settings_diff(settings: &Settings) -> Option<SettingsDiff> {
    let defaults = Settings::default();
    let diff = SettingsDiff {
        d: flag(settings.dark_theme(), defaults.dark_theme()),
        m: flag(settings.week_starts_monday(), defaults.week_starts_monday()),
        r: flag(settings.read_only(), defaults.read_only()),
        n: flag(settings.notifications(), defaults.notifications()),
        v: Some(settings.view()).filter(|v| *v != defaults.view()).map(|v| v.as_str().to_string()),
        l: Some(settings.language()).filter(|l| *l != defaults.language()).map(|l| l.to_string()),
        w: Some(settings.recurrence_window_days()).filter(|w| *w != defaults.recurrence_window_days()),
    };

    if diff == SettingsDiff::default() { None } else { Some(diff) }
}

fn planner_diff(planner: &PlannerState) -> Option<PlannerDiff> {
    let defaults = PlannerState::default();
    let diff = PlannerDiff {
        h: planner.home_zone().map(|h| h.to_string()),
        z: Some(planner.compared_zones()).filter(|z| *z != defaults.compared_zones()).map(|z| z.to_vec()),
        s: planner.selected_timestamp(),
        d: planner.reference_date().map(|d| d.format("%Y-%m-%d").to_string()),
        f24: Some(planner.use_24_hour_format()).filter(|f| *f != defaults.use_24_hour_format()),
    };

    if diff == PlannerDiff::default() { None } else { Some(diff) }
}
