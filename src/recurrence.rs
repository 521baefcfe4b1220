//! Expansion of (possibly recurring) events into dated occurrences
//!
//! Expansion is a pure function of the events, a half-open window `[range_start, range_end)` and the time zone in
//! which calendar arithmetic happens (day boundaries, "same day next month"...). It can be called on every
//! re-render, with any window: records are fast-forwarded to the window by arithmetic, never by stepping from their
//! original start.
//!
//! Monthly and yearly rules clamp to the last valid day: an event anchored on the 31st happens on the 30th in April
//! and on the 28th (or 29th) in February; an event anchored on February 29th happens on February 28th in common years.
//! The clamping is always computed from the original anchor, so the event is back on the 31st in March.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::MINUTES_PER_DAY;
use crate::event::{EventRecord, Occurrence, RecurrenceRule};

/// Expands events in a given time zone
#[derive(Clone, Debug)]
pub struct RecurrenceEngine<Tz: TimeZone> {
    tz: Tz,
}

impl RecurrenceEngine<Utc> {
    /// An engine whose days start at midnight UTC
    pub fn utc() -> Self {
        Self { tz: Utc }
    }
}

impl<Tz: TimeZone> RecurrenceEngine<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn time_zone(&self) -> &Tz {
        &self.tz
    }

    /// See [`expand`]
    pub fn expand(&self, events: &[EventRecord], range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> Vec<Occurrence> {
        expand(events, range_start, range_end, &self.tz)
    }
}

/// Every occurrence whose interval intersects `[range_start, range_end)`, sorted by start, then by position of the
/// originating record.
pub fn expand<Tz: TimeZone>(events: &[EventRecord], range_start: DateTime<Utc>, range_end: DateTime<Utc>, tz: &Tz) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    if range_end <= range_start {
        return occurrences;
    }

    for (source_index, event) in events.iter().enumerate() {
        expand_one(event, source_index, range_start, range_end, tz, &mut occurrences);
    }

    occurrences.sort_by_key(|occ| (occ.start, occ.source_index));
    occurrences
}

fn expand_one<Tz: TimeZone>(event: &EventRecord, source_index: usize, range_start: DateTime<Utc>, range_end: DateTime<Utc>,
                            tz: &Tz, out: &mut Vec<Occurrence>)
{
    let start = match event.start() {
        Some(start) => start,
        None => {
            log::debug!("Event {} starts out of the representable range, skipping it", source_index);
            return;
        },
    };

    let local_start = start.with_timezone(tz).naive_local();
    // All-day events are anchored on their local midnight
    let anchor = if event.is_all_day() {
        local_start.date().and_time(chrono::NaiveTime::MIN)
    } else {
        local_start
    };
    let length = if event.is_all_day() {
        Duration::minutes(MINUTES_PER_DAY)
    } else {
        Duration::minutes(event.duration_minutes() as i64)
    };

    let rule = event.recurrence();
    let first = first_index(rule, anchor, length, range_start.with_timezone(tz).naive_local());

    let mut k = first;
    loop {
        let naive_start = match nth_start(rule, anchor, k) {
            Some(naive) => naive,
            None => break,
        };

        let (occ_start, occ_end) = if event.is_all_day() {
            let day = naive_start.date();
            let next_day = match day.succ_opt() {
                Some(d) => d,
                None => break,
            };
            (resolve_local(tz, day.and_time(chrono::NaiveTime::MIN)), resolve_local(tz, next_day.and_time(chrono::NaiveTime::MIN)))
        } else {
            // The first occurrence is exactly the stored instant, even when its local time is ambiguous
            let occ_start = if k == 0 { start } else { resolve_local(tz, naive_start) };
            match occ_start.checked_add_signed(length) {
                Some(occ_end) => (occ_start, occ_end),
                None => {
                    log::debug!("Event {} ends out of the representable range, stopping its expansion", source_index);
                    break;
                },
            }
        };

        if occ_start >= range_end {
            break;
        }
        if occ_end > range_start {
            out.push(Occurrence {
                start: occ_start,
                end: occ_end,
                title: event.title().to_string(),
                color_index: event.color_index(),
                is_all_day: event.is_all_day(),
                source_index,
            });
        }

        if !rule.is_recurring() {
            break;
        }
        k += 1;
    }
}

/// The first occurrence index worth looking at: no occurrence before it can reach `range_start`.
///
/// This undershoots by one period, the caller filters what does not intersect the window.
fn first_index(rule: RecurrenceRule, anchor: NaiveDateTime, length: Duration, local_range_start: NaiveDateTime) -> i64 {
    let target = match local_range_start.checked_sub_signed(length) {
        Some(t) => t,
        None => return 0,
    };
    if target <= anchor {
        return 0;
    }

    let elapsed = match rule {
        RecurrenceRule::None => 0,
        RecurrenceRule::Daily => (target - anchor).num_minutes() / MINUTES_PER_DAY,
        RecurrenceRule::Weekly => (target - anchor).num_minutes() / (7 * MINUTES_PER_DAY),
        RecurrenceRule::Monthly => months_between(anchor.date(), target.date()),
        RecurrenceRule::Yearly => months_between(anchor.date(), target.date()) / 12,
    };
    (elapsed - 1).max(0)
}

/// Local start of the `k`-th occurrence (the anchor is the 0-th)
fn nth_start(rule: RecurrenceRule, anchor: NaiveDateTime, k: i64) -> Option<NaiveDateTime> {
    match rule {
        RecurrenceRule::None => if k == 0 { Some(anchor) } else { None },
        RecurrenceRule::Daily => anchor.checked_add_signed(Duration::try_days(k)?),
        RecurrenceRule::Weekly => anchor.checked_add_signed(Duration::try_weeks(k)?),
        RecurrenceRule::Monthly => Some(add_months(anchor.date(), k)?.and_time(anchor.time())),
        RecurrenceRule::Yearly => Some(add_months(anchor.date(), k.checked_mul(12)?)?.and_time(anchor.time())),
    }
}

/// Calendar months from `from` to `to`, ignoring the day of month
fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// Same day `months` later, clamped to the last day of the target month
pub fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = (date.year() as i64).checked_mul(12)?.checked_add(date.month0() as i64)?.checked_add(months)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year.checked_add(1)?, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}

/// Map a wall-clock time to an instant.
///
/// Ambiguous times (DST fold) take the earlier instant, and times that do not exist (DST gap) are pushed forward by an hour.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    naive.checked_add_signed(Duration::hours(1))
        .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn record(start: DateTime<Utc>, duration: u32, rule: RecurrenceRule) -> EventRecord {
        EventRecord::timed(&start, duration, "ev").with_recurrence(rule)
    }

    #[test]
    fn month_arithmetic_clamps() {
        let jan31 = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        assert_eq!(add_months(jan31, 1), NaiveDate::from_ymd_opt(2023, 2, 28));
        assert_eq!(add_months(jan31, 2), NaiveDate::from_ymd_opt(2023, 3, 31));
        assert_eq!(add_months(jan31, 13), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(add_months(jan31, -2), NaiveDate::from_ymd_opt(2022, 11, 30));
        assert_eq!(months_between(jan31, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), 14);
    }

    #[test]
    fn daily_covers_each_day() {
        let events = vec![record(at(2024, 5, 6, 9, 0), 60, RecurrenceRule::Daily)];
        let day0 = at(2024, 5, 6, 0, 0);

        // Four calendar days, the last one up to its very end
        let occs = expand(&events, day0, at(2024, 5, 9, 23, 59) + Duration::seconds(59), &Utc);
        assert_eq!(occs.len(), 4);
        for (i, occ) in occs.iter().enumerate() {
            assert_eq!(occ.start, at(2024, 5, 6 + i as u32, 9, 0));
            assert_eq!(occ.end, at(2024, 5, 6 + i as u32, 10, 0));
            assert!(!occ.is_all_day);
        }

        // Strictly half-open: the occurrence of day 3 starts after the window
        let occs = expand(&events, day0, day0 + Duration::days(3), &Utc);
        assert_eq!(occs.len(), 3);
    }

    #[test]
    fn old_daily_events_are_fast_forwarded() {
        let events = vec![record(at(1971, 1, 1, 8, 0), 30, RecurrenceRule::Daily)];
        let occs = expand(&events, at(2090, 3, 1, 0, 0), at(2090, 3, 2, 0, 0), &Utc);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start, at(2090, 3, 1, 8, 0));
    }

    #[test]
    fn weekly_stays_on_its_weekday() {
        let monday = at(2024, 1, 1, 18, 0);
        assert_eq!(monday.weekday(), Weekday::Mon);
        let events = vec![record(monday, 45, RecurrenceRule::Weekly)];

        let occs = expand(&events, at(2024, 3, 4, 0, 0), at(2024, 3, 25, 0, 0), &Utc);
        assert_eq!(occs.len(), 3);
        assert!(occs.iter().all(|o| o.start.weekday() == Weekday::Mon));
        assert_eq!(occs[0].start, at(2024, 3, 4, 18, 0));
    }

    #[test]
    fn monthly_on_the_31st_clamps_in_february() {
        let events = vec![record(at(2023, 1, 31, 12, 0), 60, RecurrenceRule::Monthly)];
        let occs = expand(&events, at(2023, 1, 1, 0, 0), at(2023, 4, 1, 0, 0), &Utc);

        let starts: Vec<_> = occs.iter().map(|o| o.start).collect();
        assert_eq!(starts, vec![at(2023, 1, 31, 12, 0), at(2023, 2, 28, 12, 0), at(2023, 3, 31, 12, 0)]);
    }

    #[test]
    fn yearly_on_leap_day() {
        let events = vec![record(at(2020, 2, 29, 7, 0), 15, RecurrenceRule::Yearly)];
        let occs = expand(&events, at(2021, 1, 1, 0, 0), at(2025, 1, 1, 0, 0), &Utc);

        let starts: Vec<_> = occs.iter().map(|o| o.start).collect();
        assert_eq!(starts, vec![at(2021, 2, 28, 7, 0), at(2022, 2, 28, 7, 0), at(2023, 2, 28, 7, 0), at(2024, 2, 29, 7, 0)]);
    }

    #[test]
    fn all_day_events_cover_their_day() {
        let events = vec![EventRecord::all_day(&at(2024, 7, 4, 15, 30), "Holiday")];
        let occs = expand(&events, at(2024, 7, 4, 23, 0), at(2024, 7, 5, 1, 0), &Utc);
        assert_eq!(occs.len(), 1);
        assert!(occs[0].is_all_day);
        assert_eq!(occs[0].start, at(2024, 7, 4, 0, 0));
        assert_eq!(occs[0].end, at(2024, 7, 5, 0, 0));

        assert!(expand(&events, at(2024, 7, 5, 0, 0), at(2024, 7, 6, 0, 0), &Utc).is_empty());
    }

    #[test]
    fn straddling_occurrences_are_emitted_once() {
        let events = vec![record(at(2024, 1, 1, 23, 0), 120, RecurrenceRule::None)];
        let occs = expand(&events, at(2024, 1, 2, 0, 0), at(2024, 1, 3, 0, 0), &Utc);
        assert_eq!(occs.len(), 1);

        let daily = vec![record(at(2024, 1, 1, 23, 0), 120, RecurrenceRule::Daily)];
        let occs = expand(&daily, at(2024, 1, 5, 0, 0), at(2024, 1, 5, 12, 0), &Utc);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start, at(2024, 1, 4, 23, 0));

        assert!(expand(&events, at(2024, 1, 2, 1, 0), at(2024, 1, 3, 0, 0), &Utc).is_empty());
    }

    #[test]
    fn output_is_sorted_with_stable_ties() {
        let events = vec![
            record(at(2024, 1, 1, 10, 0), 30, RecurrenceRule::None),
            record(at(2024, 1, 1, 9, 0), 30, RecurrenceRule::Daily),
            record(at(2024, 1, 1, 10, 0), 30, RecurrenceRule::None),
        ];
        let occs = expand(&events, at(2024, 1, 1, 0, 0), at(2024, 1, 3, 0, 0), &Utc);
        let order: Vec<_> = occs.iter().map(|o| (o.start, o.source_index)).collect();
        assert_eq!(order, vec![
            (at(2024, 1, 1, 9, 0), 1),
            (at(2024, 1, 1, 10, 0), 0),
            (at(2024, 1, 1, 10, 0), 2),
            (at(2024, 1, 2, 9, 0), 1),
        ]);
    }

    #[test]
    fn daily_keeps_wall_clock_time_across_dst() {
        let paris = chrono_tz::Europe::Paris;
        let start = paris.with_ymd_and_hms(2024, 3, 29, 9, 0, 0).unwrap().with_timezone(&Utc);
        let events = vec![record(start, 60, RecurrenceRule::Daily)];

        let engine = RecurrenceEngine::new(paris);
        let occs = engine.expand(&events, at(2024, 4, 1, 0, 0), at(2024, 4, 2, 0, 0));
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start, paris.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap().with_timezone(&Utc));
    }

    #[test]
    fn empty_or_inverted_windows() {
        let events = vec![record(at(2024, 1, 1, 9, 0), 60, RecurrenceRule::Daily)];
        assert!(expand(&events, at(2024, 1, 2, 0, 0), at(2024, 1, 2, 0, 0), &Utc).is_empty());
        assert!(expand(&events, at(2024, 1, 3, 0, 0), at(2024, 1, 2, 0, 0), &Utc).is_empty());
        assert!(RecurrenceEngine::utc().expand(&events, at(2023, 1, 1, 0, 0), at(2023, 12, 31, 0, 0)).is_empty());
    }

    #[test]
    fn records_ending_past_the_representable_range_are_skipped() {
        // Starts around year 256 000, and lasts u32::MAX minutes
        let state = crate::codec::normalize(&serde_json::json!({ "e": [
            [135_000_000_000i64, 4_294_967_295u32, "far"],
            [135_000_000_000i64, 4_294_967_295u32, "far daily", 0, "d"],
            [28_402_230, 60, "near"],
        ]}));
        assert_eq!(state.events().len(), 3);

        let occs = expand(state.events(), at(2024, 1, 1, 0, 0), at(2024, 1, 31, 0, 0), &Utc);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].title, "near");
        assert_eq!(occs[0].source_index, 2);
    }

    #[test]
    fn long_windows_are_not_truncated() {
        let events = vec![record(at(1900, 1, 1, 6, 0), 10, RecurrenceRule::Daily)];
        let occs = expand(&events, at(1900, 1, 1, 0, 0), at(2100, 1, 1, 0, 0), &Utc);
        let days = (at(2100, 1, 1, 0, 0) - at(1900, 1, 1, 0, 0)).num_days() as usize;
        assert_eq!(occs.len(), days);
    }
}
