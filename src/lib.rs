//! This crate provides a calendar whose whole document lives in the fragment of a URL.
//!
//! A [`CalendarState`] is turned into a short, URL-safe string (and back) by the [`StateCodec`]: it is compacted
//! against its defaults, serialized, compressed, and optionally encrypted with a password (see the [`codec`] module).
//!
//! Events may recur. The [`recurrence`] module turns them into concrete [`Occurrence`]s for any time window.
//!
//! A [`CalendarSession`] ties everything together for an application: it owns the current document, refuses edits
//! on locked or read-only documents, and saves changes to a [`FragmentStore`](fragment::FragmentStore) after a short delay.

pub mod config;
pub mod error;
pub use error::{CalendarError, CodecError, SessionError};

mod event;
pub use event::{minutes_since_epoch, EventRecord, Occurrence, RecurrenceRule, UnknownRecurrenceCode};
pub mod state;
pub use state::CalendarState;

pub mod compress;
pub mod crypto;
pub mod codec;
pub use codec::StateCodec;

pub mod recurrence;
pub use recurrence::RecurrenceEngine;

pub mod fragment;
pub mod save;
pub mod session;
pub use session::{CalendarSession, LockState};

pub mod path_import;
pub mod notify;
pub use notify::NotificationTracker;
