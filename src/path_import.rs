//! Creating events from the path of a link
//!
//! A path such as `/2024/05/06/09/30+45/Team-sync,/2024/05/07/Holiday` describes two events:
//! a 45-minute "Team sync" and an all-day "Holiday". Each comma-separated block is
//! `YYYY/MM/DD[/HH/MM[+DURATION]][/title-words]`, where the date may be preceded by anything.
//! Blocks that contain no valid date are ignored.

use chrono::{NaiveDate, NaiveTime, TimeZone};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::DEFAULT_EVENT_DURATION;
use crate::event::{minutes_since_epoch, EventRecord, RecurrenceRule};
use crate::recurrence::resolve_local;

/// Title of events whose block has no title words
pub const DEFAULT_PATH_EVENT_TITLE: &str = "New Event (URL)";

/// Parse every event described by `path`. Dates and times are read in `tz`.
pub fn parse_path<Tz: TimeZone>(path: &str, tz: &Tz) -> Vec<EventRecord> {
    let decoded = match percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    };
    let clean = decoded.trim_matches('/').trim();
    if clean.is_empty() {
        return Vec::new();
    }

    clean.split(',')
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(|block| {
            let event = parse_block(block, tz);
            if event.is_none() {
                log::debug!("Ignoring path block {:?}, it contains no valid date", block);
            }
            event
        })
        .collect()
}

/// Same as [`parse_path`], on the path of a full URL
pub fn parse_url<Tz: TimeZone>(url: &Url, tz: &Tz) -> Vec<EventRecord> {
    parse_path(url.path(), tz)
}

fn parse_block<Tz: TimeZone>(block: &str, tz: &Tz) -> Option<EventRecord> {
    let parts: Vec<&str> = block.split('/').filter(|part| !part.is_empty()).collect();
    let date_start = (0..parts.len().saturating_sub(2))
        .find(|&i| date_from_parts(&parts[i..]).is_some())?;
    let parts = &parts[date_start..];
    let date = date_from_parts(parts)?;

    let time = if parts.len() >= 5 { parse_time(parts[3], parts[4]) } else { None };
    let (start, duration, title_parts) = match time {
        Some((time, duration)) => (resolve_local(tz, date.and_time(time)), duration, &parts[5..]),
        None => (resolve_local(tz, date.and_time(NaiveTime::MIN)), 0, &parts[3..]),
    };

    let title = title_parts.join(" ").replace('-', " ");
    let title = title.trim();
    let title = if title.is_empty() { DEFAULT_PATH_EVENT_TITLE } else { title };

    Some(EventRecord::new(minutes_since_epoch(&start), duration, title, 0, RecurrenceRule::None))
}

/// Plain ASCII digits only (no sign, no spaces)
fn integer(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn date_from_parts(parts: &[&str]) -> Option<NaiveDate> {
    match parts {
        [year, month, day, ..] => {
            let year = i32::try_from(integer(year)?).ok()?;
            NaiveDate::from_ymd_opt(year, integer(month)?, integer(day)?)
        },
        _ => None,
    }
}

/// `HH` and `MM[+DURATION]`
fn parse_time(hour: &str, minute: &str) -> Option<(NaiveTime, u32)> {
    let hour = integer(hour)?;
    let (minute, duration) = match minute.split_once('+') {
        None => (minute, DEFAULT_EVENT_DURATION),
        Some((minute, duration)) => {
            if duration.contains('+') {
                return None;
            }
            (minute, integer(duration)?.max(1))
        },
    };
    let minute = integer(minute)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some((time, duration))
}
