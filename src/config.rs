//! Support for library configuration options
//!
//! Constants shared by the whole crate, and the small configuration structs that tune the operations
//! that need tuning (key derivation, debounced saves, notifications). Every struct is validated once,
//! when it is built, so that the operations using it never have to re-check it.

use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::CalendarError;

/// Title of a freshly created calendar
pub const DEFAULT_TITLE: &str = "hash-calendar";
/// Longest calendar title that is kept (in characters)
pub const MAX_TITLE_LENGTH: usize = 60;
/// Longest event title that is kept (in characters)
pub const MAX_EVENT_TITLE_LENGTH: usize = 80;
/// Title given to events that have none
pub const UNTITLED_EVENT: &str = "Untitled";

/// Largest palette a document may carry (default colors plus custom ones)
pub const MAX_PALETTE_SIZE: usize = 32;

/// How many zones can be compared with the home zone, on top of the default one
pub const PLANNER_MAX_ZONES: usize = 3;
/// Maximum length of the compared zones list
pub const MAX_COMPARED_ZONES: usize = 1 + PLANNER_MAX_ZONES;
/// The zone every planner starts with
pub const DEFAULT_COMPARED_ZONE: &str = "UTC";

/// Default recurrence expansion window, in days
pub const DEFAULT_RECURRENCE_WINDOW_DAYS: u32 = 365;
/// Largest accepted recurrence expansion window, in days
pub const MAX_RECURRENCE_WINDOW_DAYS: u32 = 3650;

/// Default duration (in minutes) of timed events that do not specify one
pub const DEFAULT_EVENT_DURATION: u32 = 60;

pub const MINUTES_PER_DAY: i64 = 1440;
pub const MS_PER_MINUTE: i64 = 60_000;

/// Default palette, as stored in documents
pub static DEFAULT_COLORS: Lazy<Vec<String>> = Lazy::new(|| {
    ["#ff6b6b", "#ffd43b", "#4dabf7", "#63e6be", "#9775fa"]
        .iter()
        .map(|c| c.to_string())
        .collect()
});

/// Languages the front-end has translations for. The first one is the default.
pub static SUPPORTED_LANGUAGES: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["en", "it", "ta", "si"]);

/// The language used when none (or an unsupported one) is set
pub fn default_language() -> &'static str {
    SUPPORTED_LANGUAGES[0]
}



/// Settings of the password-based key derivation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoConfig {
    iterations: u32,
}

impl CryptoConfig {
    pub const DEFAULT_ITERATIONS: u32 = 150_000;
    /// Below this, brute-forcing a leaked link becomes cheap
    pub const MIN_ITERATIONS: u32 = 1_000;

    pub fn new(iterations: u32) -> Result<Self, CalendarError> {
        if iterations < Self::MIN_ITERATIONS {
            return Err(CalendarError::InvalidConfig(format!(
                "at least {} PBKDF2 iterations are required, got {}", Self::MIN_ITERATIONS, iterations
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { iterations: Self::DEFAULT_ITERATIONS }
    }
}



/// Settings of the debounced persistence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveConfig {
    debounce: Duration,
}

impl SaveConfig {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

    pub fn new(debounce: Duration) -> Result<Self, CalendarError> {
        if debounce > Duration::from_secs(60) {
            return Err(CalendarError::InvalidConfig(format!("debounce delay {:?} is longer than a minute", debounce)));
        }
        Ok(Self { debounce })
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self { debounce: Self::DEFAULT_DEBOUNCE }
    }
}



/// Settings of the upcoming-event notifications
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationConfig {
    lead: chrono::Duration,
    check_interval: chrono::Duration,
}

impl NotificationConfig {
    pub fn new(lead: chrono::Duration, check_interval: chrono::Duration) -> Result<Self, CalendarError> {
        if lead < chrono::Duration::zero() {
            return Err(CalendarError::InvalidConfig("notification lead time must not be negative".to_string()));
        }
        if check_interval <= chrono::Duration::zero() {
            return Err(CalendarError::InvalidConfig("notification check interval must be positive".to_string()));
        }
        Ok(Self { lead, check_interval })
    }

    pub fn lead(&self) -> chrono::Duration            { self.lead }
    pub fn check_interval(&self) -> chrono::Duration  { self.check_interval }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            lead: chrono::Duration::minutes(10),
            check_interval: chrono::Duration::seconds(30),
        }
    }
}
