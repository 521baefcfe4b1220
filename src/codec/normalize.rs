//! Rebuilding a valid document from whatever a fragment contained
//!
//! Decoding never trusts the payload: every field is rebuilt against its default, malformed values are clamped or dropped,
//! and unknown keys are ignored. Nothing here is an error. What had to be repaired is reported as [`ValidationIssue`]s.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::config::{DEFAULT_COLORS, MAX_PALETTE_SIZE, MAX_TITLE_LENGTH};
use crate::event::{clean_event_title, EventRecord, RecurrenceRule};
use crate::state::{canonical_color, clean_title, is_valid_zone, CalendarState, PlannerState, Settings, View};

const KNOWN_KEYS: [&str; 8] = ["t", "c", "e", "s", "mp", "timezones", "z", "tz"];
const LEGACY_ZONE_KEYS: [&str; 3] = ["timezones", "z", "tz"];

/// Something in a decoded payload that had to be repaired
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationIssue {
    /// The payload is not a JSON object at all
    NotAnObject,
    UnknownKey(String),
    TitleTruncated,
    InvalidColor { slot: String },
    /// A palette index that would leave a hole in the palette
    PaletteSlotOutOfRange(usize),
    /// An event entry that is not an array of at least three items
    MalformedEvent { index: usize },
    /// A start that is not a finite, whole number of minutes
    InvalidStart { index: usize },
    ColorIndexClamped { index: usize },
    UnknownRecurrence { index: usize, code: String },
    UnknownView(String),
    UnsupportedLanguage(String),
    InvalidZone(String),
    InvalidDate(String),
}

/// See [`normalize_with_report`]
pub fn normalize(raw: &Value) -> CalendarState {
    normalize_with_report(raw).0
}

/// Build a valid document out of a parsed payload, and list what had to be repaired
pub fn normalize_with_report(raw: &Value) -> (CalendarState, Vec<ValidationIssue>) {
    let mut issues = Vec::new();

    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => {
            issues.push(ValidationIssue::NotAnObject);
            return (CalendarState::default(), issues);
        },
    };

    for key in obj.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            issues.push(ValidationIssue::UnknownKey(key.clone()));
        }
    }

    let title = match obj.get("t") {
        Some(Value::String(t)) => {
            if t.chars().count() > MAX_TITLE_LENGTH {
                issues.push(ValidationIssue::TitleTruncated);
            }
            clean_title(t)
        },
        _ => CalendarState::default().title().to_string(),
    };

    let palette = normalize_palette(obj.get("c"), &mut issues);
    let events = normalize_events(obj.get("e"), palette.len(), &mut issues);
    let settings = normalize_settings(obj.get("s"), &mut issues);
    let planner = normalize_planner(obj, &mut issues);

    for issue in &issues {
        log::debug!("Repaired decoded calendar: {:?}", issue);
    }

    (CalendarState::from_parts(title, palette, events, settings, planner), issues)
}

fn normalize_palette(raw: Option<&Value>, issues: &mut Vec<ValidationIssue>) -> Vec<String> {
    let mut palette = DEFAULT_COLORS.clone();

    match raw {
        Some(Value::Object(diff)) => {
            let mut slots = BTreeMap::new();
            for (key, color) in diff {
                match key.trim().parse::<usize>() {
                    Ok(index) => { slots.insert(index, color); },
                    Err(_) => issues.push(ValidationIssue::InvalidColor { slot: key.clone() }),
                }
            }

            for (index, color) in slots {
                let color = match color.as_str().and_then(canonical_color) {
                    Some(c) => c,
                    None => {
                        issues.push(ValidationIssue::InvalidColor { slot: index.to_string() });
                        continue;
                    },
                };
                if index < palette.len() {
                    palette[index] = color;
                } else if index == palette.len() && palette.len() < MAX_PALETTE_SIZE {
                    palette.push(color);
                } else {
                    issues.push(ValidationIssue::PaletteSlotOutOfRange(index));
                }
            }
        },
        // Older documents stored the whole palette
        Some(Value::Array(colors)) if !colors.is_empty() => {
            let mut kept = Vec::new();
            for (index, color) in colors.iter().enumerate() {
                match color.as_str().and_then(canonical_color) {
                    Some(c) if kept.len() < MAX_PALETTE_SIZE => kept.push(c),
                    Some(_) => issues.push(ValidationIssue::PaletteSlotOutOfRange(index)),
                    None => issues.push(ValidationIssue::InvalidColor { slot: index.to_string() }),
                }
            }
            // Pad with the default colors, so that a palette is never shorter than the default one
            for (index, default) in DEFAULT_COLORS.iter().enumerate() {
                if index >= kept.len() {
                    kept.push(default.clone());
                }
            }
            palette = kept;
        },
        _ => {},
    }

    palette
}

fn normalize_events(raw: Option<&Value>, palette_len: usize, issues: &mut Vec<ValidationIssue>) -> Vec<EventRecord> {
    let entries = match raw {
        Some(Value::Array(entries)) => entries,
        _ => return Vec::new(),
    };

    let mut events = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let fields = match entry.as_array() {
            Some(fields) if fields.len() >= 3 => fields,
            _ => {
                issues.push(ValidationIssue::MalformedEvent { index });
                continue;
            },
        };

        let start_minute = match whole_number(&fields[0]) {
            Some(start) => start,
            None => {
                issues.push(ValidationIssue::InvalidStart { index });
                continue;
            },
        };

        let duration_minutes = number(&fields[1])
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.floor().min(u32::MAX as f64) as u32)
            .unwrap_or(0);

        let title = match &fields[2] {
            Value::String(s) => clean_event_title(s),
            Value::Number(n) => clean_event_title(&n.to_string()),
            _ => clean_event_title(""),
        };

        let color_index = match fields.get(3).and_then(number).filter(|n| n.is_finite()) {
            None => 0,
            Some(raw_index) => {
                let last = palette_len.saturating_sub(1);
                let clamped = raw_index.floor().max(0.0).min(last as f64) as usize;
                if clamped as f64 != raw_index {
                    issues.push(ValidationIssue::ColorIndexClamped { index });
                }
                clamped
            },
        };

        let recurrence = match fields.get(4) {
            None | Some(Value::Null) => RecurrenceRule::None,
            Some(Value::String(code)) => match RecurrenceRule::from_code(code) {
                Ok(rule) => rule,
                Err(unknown) => {
                    issues.push(ValidationIssue::UnknownRecurrence { index, code: unknown.0 });
                    RecurrenceRule::None
                },
            },
            Some(other) => {
                issues.push(ValidationIssue::UnknownRecurrence { index, code: other.to_string() });
                RecurrenceRule::None
            },
        };

        events.push(EventRecord::new(start_minute, duration_minutes, &title, color_index, recurrence));
    }
    events
}

fn normalize_settings(raw: Option<&Value>, issues: &mut Vec<ValidationIssue>) -> Settings {
    let mut settings = Settings::default();
    let obj = match raw.and_then(Value::as_object) {
        Some(obj) => obj,
        None => return settings,
    };

    settings.set_dark_theme(truthy(obj.get("d")));
    settings.set_week_starts_monday(truthy(obj.get("m")));
    settings.set_read_only(truthy(obj.get("r")));
    settings.set_notifications(truthy(obj.get("n")));

    if let Some(view) = obj.get("v").filter(|v| !v.is_null()) {
        match view.as_str().map(str::parse::<View>) {
            Some(Ok(view)) => settings.set_view(view),
            _ => issues.push(ValidationIssue::UnknownView(view.to_string())),
        }
    }

    if let Some(language) = obj.get("l").and_then(Value::as_str) {
        settings.set_language(language);
        if settings.language() != language {
            issues.push(ValidationIssue::UnsupportedLanguage(language.to_string()));
        }
    }

    if let Some(days) = obj.get("w").and_then(number).filter(|d| d.is_finite()) {
        settings.set_recurrence_window_days(days.floor().max(0.0).min(u32::MAX as f64) as u32);
    }

    settings
}

fn normalize_planner(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) -> PlannerState {
    let defaults = PlannerState::default();
    let mut home_zone = None;
    let mut zones = defaults.compared_zones().to_vec();
    let mut selected_timestamp = None;
    let mut reference_date = None;
    let mut use_24_hour_format = false;

    if let Some(mp) = root.get("mp").and_then(Value::as_object) {
        if let Some(h) = mp.get("h").and_then(Value::as_str) {
            if is_valid_zone(h) {
                home_zone = Some(h.to_string());
            } else {
                issues.push(ValidationIssue::InvalidZone(h.to_string()));
            }
        }
        if let Some(z) = mp.get("z").and_then(Value::as_array) {
            zones = clean_zones(z, issues);
        }
        selected_timestamp = mp.get("s").and_then(whole_number);
        if let Some(d) = mp.get("d").and_then(Value::as_str) {
            match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
                Ok(date) => reference_date = Some(date),
                Err(_) => issues.push(ValidationIssue::InvalidDate(d.to_string())),
            }
        }
        use_24_hour_format = truthy(mp.get("f24"));
    }

    // Older documents kept their zones at the top level
    for key in LEGACY_ZONE_KEYS.iter() {
        if let Some(legacy) = root.get(*key).and_then(Value::as_array) {
            for zone in clean_zones(legacy, issues) {
                if !zones.contains(&zone) {
                    zones.push(zone);
                }
            }
            break;
        }
    }

    PlannerState::from_parts(home_zone, zones, selected_timestamp, reference_date, use_24_hour_format)
}

fn clean_zones(raw: &[Value], issues: &mut Vec<ValidationIssue>) -> Vec<String> {
    let mut zones: Vec<String> = Vec::new();
    for zone in raw.iter().filter_map(Value::as_str) {
        let zone = zone.trim();
        if zone.is_empty() || zones.iter().any(|z| z == zone) {
            continue;
        }
        if !is_valid_zone(zone) {
            issues.push(ValidationIssue::InvalidZone(zone.to_string()));
            continue;
        }
        zones.push(zone.to_string());
    }
    zones
}

/// Loose numeric reading: JSON numbers, numeric strings and booleans
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// A finite number with no fractional part
fn whole_number(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let n = number(value)?;
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// JavaScript truthiness, since flags have been written as `1`, `true`, or even `"1"` over time
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_gives_default_document() {
        let (state, issues) = normalize_with_report(&json!({}));
        assert_eq!(state, CalendarState::default());
        assert!(issues.is_empty());

        let (state, issues) = normalize_with_report(&json!([1, 2, 3]));
        assert_eq!(state, CalendarState::default());
        assert_eq!(issues, vec![ValidationIssue::NotAnObject]);
    }

    #[test]
    fn events_are_repaired_or_dropped() {
        let raw = json!({
            "e": [
                [100, 30, "ok"],
                [1.5, 30, "fractional start"],
                ["abc", 30, "bad start"],
                [200, -5, "", 42, "q"],
                "not an event",
                [300, 10.7, "weekly", 0, "w"],
            ]
        });
        let (state, issues) = normalize_with_report(&raw);

        let events = state.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].title(), "ok");

        assert_eq!(events[1].start_minute(), 200);
        assert_eq!(events[1].duration_minutes(), 0);
        assert_eq!(events[1].title(), "Untitled");
        assert_eq!(events[1].color_index(), 4);
        assert_eq!(events[1].recurrence(), RecurrenceRule::None);

        assert_eq!(events[2].duration_minutes(), 10);
        assert_eq!(events[2].recurrence(), RecurrenceRule::Weekly);

        assert!(issues.contains(&ValidationIssue::InvalidStart { index: 1 }));
        assert!(issues.contains(&ValidationIssue::InvalidStart { index: 2 }));
        assert!(issues.contains(&ValidationIssue::ColorIndexClamped { index: 3 }));
        assert!(issues.contains(&ValidationIssue::UnknownRecurrence { index: 3, code: "q".to_string() }));
        assert!(issues.contains(&ValidationIssue::MalformedEvent { index: 4 }));
    }

    #[test]
    fn palette_diff_overrides_and_extends() {
        let raw = json!({ "c": { "1": "000", "5": "#ABCDEF", "9": "123456", "2": "nope" }, "e": [[0, 0, "x", 5]] });
        let (state, issues) = normalize_with_report(&raw);

        assert_eq!(state.palette().len(), 6);
        assert_eq!(state.palette()[1], "#000000");
        assert_eq!(state.palette()[2], DEFAULT_COLORS[2]);
        assert_eq!(state.palette()[5], "#abcdef");
        assert_eq!(state.events()[0].color_index(), 5);
        assert!(issues.contains(&ValidationIssue::PaletteSlotOutOfRange(9)));
        assert!(issues.contains(&ValidationIssue::InvalidColor { slot: "2".to_string() }));
    }

    #[test]
    fn legacy_array_palette_is_padded() {
        let state = normalize(&json!({ "c": ["#111111", "bad"] }));
        assert_eq!(state.palette().len(), DEFAULT_COLORS.len());
        assert_eq!(state.palette()[0], "#111111");
        assert_eq!(state.palette()[1], DEFAULT_COLORS[1]);
    }

    #[test]
    fn settings_follow_javascript_truthiness() {
        let raw = json!({ "s": { "d": 1, "m": true, "r": 0, "n": "", "v": "agenda", "l": "xx", "w": 30 } });
        let (state, issues) = normalize_with_report(&raw);
        let settings = state.settings();
        assert!(settings.dark_theme());
        assert!(settings.week_starts_monday());
        assert!(!settings.read_only());
        assert!(!settings.notifications());
        assert_eq!(settings.view(), View::Agenda);
        assert_eq!(settings.language(), "en");
        assert_eq!(settings.recurrence_window_days(), 30);
        assert!(issues.contains(&ValidationIssue::UnsupportedLanguage("xx".to_string())));
    }

    #[test]
    fn planner_zones_are_deduplicated_and_migrated() {
        let raw = json!({
            "mp": { "h": "Europe/Paris", "z": ["UTC", "Europe/Paris", "Asia/Tokyo", "UTC", "Nowhere/Land"], "d": "2024-02-29", "f24": true },
            "timezones": ["America/New_York", "Asia/Tokyo"],
            "bogus": 1,
        });
        let (state, issues) = normalize_with_report(&raw);
        let planner = state.planner();

        assert_eq!(planner.home_zone(), Some("Europe/Paris"));
        assert_eq!(planner.compared_zones(), &["UTC".to_string(), "Asia/Tokyo".to_string(), "America/New_York".to_string()]);
        assert_eq!(planner.reference_date(), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!(planner.use_24_hour_format());
        assert!(issues.contains(&ValidationIssue::InvalidZone("Nowhere/Land".to_string())));
        assert!(issues.contains(&ValidationIssue::UnknownKey("bogus".to_string())));
    }
}
