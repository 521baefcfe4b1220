//! Reminders for upcoming events
//!
//! A host polls [`NotificationTracker::due`] every `check_interval`. Each call returns the timed occurrences that start
//! about `lead` from now, and never returns the same occurrence twice.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::NotificationConfig;
use crate::event::{EventRecord, Occurrence};
use crate::recurrence;

#[derive(Clone, Debug, Default)]
pub struct NotificationTracker {
    config: NotificationConfig,
    /// `(source_index, start)` of everything already notified
    notified: HashSet<(usize, DateTime<Utc>)>,
}

impl NotificationTracker {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config, notified: HashSet::new() }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Occurrences that should be notified now.
    ///
    /// All-day events are never notified.
    pub fn due<Tz: TimeZone>(&mut self, events: &[EventRecord], now: DateTime<Utc>, tz: &Tz) -> Vec<Occurrence> {
        let lead = self.config.lead();
        let interval = self.config.check_interval();
        let window_start = now + lead - interval;
        let window_end = now + lead + interval;

        // Both ends of the window are inclusive
        let candidates = recurrence::expand(events, window_start, window_end + Duration::milliseconds(1), tz);

        let mut due = Vec::new();
        for occ in candidates {
            if occ.is_all_day || occ.start < window_start || occ.start > window_end {
                continue;
            }
            if self.notified.insert((occ.source_index, occ.start)) {
                log::debug!("Event {} ({}) is due for a notification", occ.source_index, occ.start);
                due.push(occ);
            }
        }

        let horizon = now - lead;
        self.notified.retain(|(_, start)| *start >= horizon);
        due
    }

    /// Forget about every notification sent so far
    pub fn reset(&mut self) {
        self.notified.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecurrenceRule;

    fn at(h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, min, s).unwrap()
    }

    #[test]
    fn each_occurrence_is_notified_once() {
        let events = vec![
            EventRecord::timed(&at(10, 0, 0), 30, "Standup").with_recurrence(RecurrenceRule::Daily),
            EventRecord::all_day(&at(10, 0, 0), "Birthday"),
        ];
        let mut tracker = NotificationTracker::default();

        assert!(tracker.due(&events, at(9, 40, 0), &Utc).is_empty());

        let due = tracker.due(&events, at(9, 49, 45), &Utc);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "Standup");
        assert_eq!(due[0].start, at(10, 0, 0));

        assert!(tracker.due(&events, at(9, 50, 15), &Utc).is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let events = vec![EventRecord::timed(&at(10, 0, 0), 30, "Call")];
        let mut tracker = NotificationTracker::default();
        // now + 10 min + 30 s is exactly the start
        assert_eq!(tracker.due(&events, at(9, 49, 30), &Utc).len(), 1);
    }

    #[test]
    fn old_entries_are_pruned() {
        let events = vec![EventRecord::timed(&at(10, 0, 0), 30, "Call")];
        let mut tracker = NotificationTracker::default();
        assert_eq!(tracker.due(&events, at(9, 50, 0), &Utc).len(), 1);
        assert_eq!(tracker.notified.len(), 1);

        tracker.due(&events, at(10, 30, 0), &Utc);
        assert!(tracker.notified.is_empty());
    }
}
