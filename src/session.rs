//! The application context: one document, its password, and where it is saved
//!
//! A [`CalendarSession`] is the only owner of its [`CalendarState`]. Every change goes through it, so that it can
//! refuse edits on locked or read-only documents and schedule a (debounced) save after each accepted one.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::codec::{compact, is_encrypted, StateCodec};
use crate::config::SaveConfig;
use crate::error::{CalendarError, CodecError, SessionError};
use crate::event::Occurrence;
use crate::fragment::FragmentStore;
use crate::path_import;
use crate::recurrence;
use crate::save::{Debouncer, Scheduler, TokioScheduler};
use crate::state::CalendarState;

/// Whether the document is protected by a password, and whether that password is known
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    /// No password
    Open,
    /// Encrypted, and waiting for its password. The visible document is a blank one.
    Locked,
    /// Encrypted, and the password is known
    Unlocked,
}

pub struct CalendarSession<S: Scheduler = TokioScheduler> {
    state: CalendarState,
    password: Option<String>,
    lock_state: LockState,
    /// The encrypted fragment a locked session has been opened with
    locked_fragment: Option<String>,

    codec: StateCodec,
    store: Arc<dyn FragmentStore>,
    saver: Debouncer<S>,
}

impl<S: Scheduler> std::fmt::Debug for CalendarSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarSession")
            .field("state", &self.state)
            .field("lock_state", &self.lock_state)
            .finish()
    }
}

impl<S: Scheduler> CalendarSession<S> {
    /// Load the document currently stored in `store`.
    ///
    /// An encrypted fragment opens a [`LockState::Locked`] session, and a fragment that cannot be decoded opens
    /// a blank document (the fragment itself is left untouched until the next save).
    pub async fn open(store: Arc<dyn FragmentStore>, codec: StateCodec, scheduler: S, config: SaveConfig) -> Result<Self, SessionError> {
        let mut session = Self {
            state: CalendarState::default(),
            password: None,
            lock_state: LockState::Open,
            locked_fragment: None,
            codec,
            store,
            saver: Debouncer::new(scheduler, config.debounce()),
        };
        session.load().await?;
        Ok(session)
    }

    pub fn state(&self) -> &CalendarState       { &self.state }
    pub fn lock_state(&self) -> LockState       { self.lock_state }
    pub fn codec(&self) -> &StateCodec          { &self.codec }

    pub fn is_locked(&self) -> bool {
        self.lock_state == LockState::Locked
    }

    pub fn is_read_only(&self) -> bool {
        self.state.settings().read_only()
    }

    /// Re-read the fragment, after it has been changed by someone else (e.g. the user edited the address bar).
    ///
    /// A pending save is dropped. An encrypted fragment is decrypted with the current password if there is one,
    /// and locks the session otherwise.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        self.saver.cancel();
        self.load().await
    }

    async fn load(&mut self) -> Result<(), SessionError> {
        let fragment = self.store.read().map_err(|err| SessionError::Storage(err.to_string()))?;

        if is_encrypted(&fragment) {
            if let Some(password) = self.password.clone() {
                match self.codec.decode(&fragment, Some(&password)).await {
                    Ok(state) => {
                        self.state = state;
                        self.lock_state = LockState::Unlocked;
                        self.locked_fragment = None;
                        return Ok(());
                    },
                    Err(err) => log::info!("The known password does not open the new fragment ({}), locking", err),
                }
            }
            log::info!("Calendar is locked");
            self.state = CalendarState::default();
            self.password = None;
            self.lock_state = LockState::Locked;
            self.locked_fragment = Some(fragment);
            return Ok(());
        }

        self.state = match self.codec.decode(&fragment, None).await {
            Ok(state) => state,
            Err(err) => {
                log::warn!("Unable to load calendar data, starting from a blank calendar: {}", err);
                CalendarState::default()
            },
        };
        self.password = None;
        self.lock_state = LockState::Open;
        self.locked_fragment = None;
        Ok(())
    }

    /// Try to open a locked document. A wrong password leaves the session locked.
    ///
    /// Unlocking a session that is not locked does nothing.
    pub async fn unlock(&mut self, password: &str) -> Result<(), CodecError> {
        let fragment = match (&self.lock_state, &self.locked_fragment) {
            (LockState::Locked, Some(fragment)) => fragment.clone(),
            _ => return Ok(()),
        };

        match self.codec.decode(&fragment, Some(password)).await {
            Ok(state) => {
                log::info!("Calendar unlocked");
                self.state = state;
                self.password = Some(password.to_string());
                self.lock_state = LockState::Unlocked;
                self.locked_fragment = None;
                Ok(())
            },
            Err(err) => {
                log::info!("Unable to unlock the calendar: {}", err);
                Err(err)
            },
        }
    }

    /// Protect the document with a (new) password. It is saved encrypted at once.
    pub async fn lock_with(&mut self, password: &str) -> Result<(), SessionError> {
        if self.is_locked() {
            return Err(CalendarError::Locked.into());
        }
        if password.is_empty() {
            return Err(CodecError::PasswordRequired.into());
        }
        log::info!("Setting a password on the calendar");
        self.password = Some(password.to_string());
        self.lock_state = LockState::Unlocked;
        self.flush().await
    }

    /// Remove the password. The document is saved in plain form at once.
    pub async fn remove_lock(&mut self) -> Result<(), SessionError> {
        if self.is_locked() {
            return Err(CalendarError::Locked.into());
        }
        log::info!("Removing the password of the calendar");
        self.password = None;
        self.lock_state = LockState::Open;
        self.flush().await
    }

    /// Change the document, and schedule a save.
    ///
    /// Fails without calling `change` if the document is locked or read-only.
    /// `change` works on a copy of the document: if it fails, whatever it already modified is discarded.
    pub fn edit<F, T>(&mut self, change: F) -> Result<T, CalendarError>
    where
        F: FnOnce(&mut CalendarState) -> Result<T, CalendarError>,
    {
        if self.is_locked() {
            return Err(CalendarError::Locked);
        }
        if self.is_read_only() {
            return Err(CalendarError::ReadOnly);
        }
        let mut draft = self.state.clone();
        let result = change(&mut draft)?;
        self.state = draft;
        self.schedule_save();
        Ok(result)
    }

    /// The only change that is still allowed on a read-only document
    pub fn set_read_only(&mut self, read_only: bool) -> Result<(), CalendarError> {
        if self.is_locked() {
            return Err(CalendarError::Locked);
        }
        self.state.settings_mut().set_read_only(read_only);
        self.schedule_save();
        Ok(())
    }

    /// Save now, dropping any pending save. Locked documents are never saved.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        self.saver.cancel();
        if self.is_locked() {
            log::debug!("Not saving a locked calendar");
            return Ok(());
        }
        persist(&self.codec, self.store.as_ref(), &self.state, self.password.as_deref()).await
    }

    fn schedule_save(&mut self) {
        let codec = self.codec.clone();
        let store = Arc::clone(&self.store);
        let state = self.state.clone();
        let password = self.password.clone();

        self.saver.schedule(Box::pin(async move {
            if let Err(err) = persist(&codec, store.as_ref(), &state, password.as_deref()).await {
                log::error!("Unable to save the calendar: {}", err);
            }
        }));
    }

    /// Occurrences of the current document in `[range_start, range_end)`, see [`recurrence::expand`]
    pub fn occurrences<Tz: TimeZone>(&self, range_start: DateTime<Utc>, range_end: DateTime<Utc>, tz: &Tz) -> Vec<Occurrence> {
        recurrence::expand(self.state.events(), range_start, range_end, tz)
    }

    /// Append the events described by a link path (see [`path_import`]), and save at once.
    ///
    /// Returns how many events have been added. Locked and read-only documents are left untouched.
    pub async fn import_path<Tz: TimeZone>(&mut self, path: &str, tz: &Tz) -> Result<usize, SessionError> {
        if self.is_locked() || self.is_read_only() {
            log::info!("Ignoring the events of the path, the calendar cannot be edited");
            return Ok(0);
        }
        let events = path_import::parse_path(path, tz);
        if events.is_empty() {
            return Ok(0);
        }

        let count = events.len();
        for event in events {
            self.state.add_event(event);
        }
        log::info!("Imported {} event(s) from the path", count);
        self.flush().await?;
        Ok(count)
    }
}

/// Write a document to its store. A blank document without a password leaves no fragment at all.
async fn persist(codec: &StateCodec, store: &dyn FragmentStore, state: &CalendarState, password: Option<&str>) -> Result<(), SessionError> {
    if password.is_none() && compact(state).is_empty() {
        log::debug!("Nothing to save, clearing the fragment");
        return store.clear().map_err(|err| SessionError::Storage(err.to_string()));
    }

    let fragment = codec.encode(state, password).await?;
    store.replace(&fragment).map_err(|err| SessionError::Storage(err.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CryptoConfig;
    use crate::event::EventRecord;
    use crate::fragment::{FragmentWrite, MemoryFragment};
    use std::time::Duration;

    fn fast_codec() -> StateCodec {
        StateCodec::with_crypto_config(CryptoConfig::new(CryptoConfig::MIN_ITERATIONS).unwrap())
    }

    async fn open(store: &MemoryFragment) -> CalendarSession {
        let store: Arc<dyn FragmentStore> = Arc::new(store.clone());
        CalendarSession::open(store, fast_codec(), TokioScheduler::current().unwrap(), SaveConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn edits_are_saved_after_the_debounce_delay() {
        let store = MemoryFragment::new();
        let mut session = open(&store).await;
        assert_eq!(session.lock_state(), LockState::Open);

        session.edit(|state| { state.set_title("Team"); Ok(()) }).unwrap();
        session.edit(|state| Ok(state.add_event(EventRecord::new(100, 30, "A", 0, Default::default())))).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.writes().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.writes().len(), 1);

        let reopened = open(&store).await;
        assert_eq!(reopened.state(), session.state());
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_documents_refuse_edits() {
        let store = MemoryFragment::new();
        let mut session = open(&store).await;
        session.set_read_only(true).unwrap();

        assert_eq!(session.edit(|state| { state.set_title("No"); Ok(()) }), Err(CalendarError::ReadOnly));
        assert_eq!(session.import_path("/2024/01/01", &Utc).await, Ok(0));

        session.set_read_only(false).unwrap();
        assert_eq!(session.import_path("/2024/01/01", &Utc).await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_documents_clear_the_fragment() {
        let store = MemoryFragment::with_content("garbage!");
        let mut session = open(&store).await;
        assert_eq!(session.state(), &CalendarState::default());

        session.flush().await.unwrap();
        assert_eq!(store.writes(), vec![FragmentWrite::Cleared]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edits_leave_the_document_untouched() {
        let store = MemoryFragment::new();
        let mut session = open(&store).await;

        let outcome = session.edit(|state| {
            state.set_title("Half done");
            state.add_event(EventRecord::new(100, 30, "A", 0, Default::default()));
            state.remove_event(7)
        });
        assert_eq!(outcome.map(|_| ()), Err(CalendarError::NoSuchEvent(7)));
        assert_eq!(session.state(), &CalendarState::default());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.writes().is_empty());

        // A later successful edit does not carry the discarded changes
        session.edit(|state| { state.settings_mut().set_dark_theme(true); Ok(()) }).unwrap();
        assert_eq!(session.state().title(), CalendarState::default().title());
        assert!(session.state().events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_background_saves_are_not_fatal() {
        let store = MemoryFragment::new();
        let mut session = open(&store).await;
        store.fail_next_writes(1);

        session.edit(|state| { state.set_title("Retry"); Ok(()) }).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.writes().is_empty());

        session.flush().await.unwrap();
        assert_eq!(store.writes().len(), 1);
    }
}
