//! Error types

use thiserror::Error;

/// Errors that can happen while turning a document into a fragment, or a fragment back into a document.
///
/// Only the first three are expected in practice, and all of them are recoverable:
/// ask for a password, ask again, or fall back to an empty calendar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The fragment is encrypted and no password was given
    #[error("This calendar is locked, a password is required")]
    PasswordRequired,

    /// The authentication tag did not verify (wrong password, or tampered ciphertext)
    #[error("Incorrect password")]
    IncorrectPassword,

    /// The payload could not be decompressed or parsed
    #[error("Unable to decode calendar data: {0}")]
    Decode(String),

    /// Compression or encryption failed while saving
    #[error("Unable to encode calendar data: {0}")]
    Encode(String),
}

/// Errors that can happen when editing a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("The calendar is locked")]
    Locked,

    #[error("The calendar is in read-only mode")]
    ReadOnly,

    #[error("No event at index {0}")]
    NoSuchEvent(usize),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("The color palette is full")]
    PaletteFull,

    #[error("Unknown time zone: {0}")]
    InvalidZone(String),

    #[error("Too many compared time zones")]
    TooManyZones,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reported by a [`CalendarSession`](crate::CalendarSession)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The fragment store could not be read or written
    #[error("Fragment storage failed: {0}")]
    Storage(String),
}
