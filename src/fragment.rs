//! The place a document is persisted to: the fragment of the page URL
//!
//! Hosts implement [`FragmentStore`] on top of whatever owns the address bar.
//! [`MemoryFragment`] keeps everything in memory, and records every write so that they can be inspected later.

use std::error::Error;
use std::sync::{Arc, Mutex};

/// Storage for a single fragment string (without its leading `#`)
pub trait FragmentStore: Send + Sync {
    /// The current fragment. An absent fragment is an empty string.
    fn read(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
    /// Overwrite the fragment, replacing the current history entry rather than pushing a new one
    fn replace(&self, fragment: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
    /// Remove the fragment entirely
    fn clear(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}


/// A write that happened on a [`MemoryFragment`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentWrite {
    Replaced(String),
    Cleared,
}

#[derive(Debug, Default)]
struct Inner {
    current: String,
    writes: Vec<FragmentWrite>,
    /// Number of upcoming writes that will fail
    failures: u32,
}

/// An in-memory fragment.
///
/// Clones share the same fragment, so that a test can keep a handle on what a session writes.
#[derive(Clone, Debug, Default)]
pub struct MemoryFragment {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment that already holds a value (a leading `#` is stripped)
    pub fn with_content(fragment: &str) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.current = fragment.strip_prefix('#').unwrap_or(fragment).to_string();
        }
        store
    }

    /// The current value, or an empty string if the lock has been poisoned
    pub fn current(&self) -> String {
        self.inner.lock().map(|inner| inner.current.clone()).unwrap_or_default()
    }

    /// Every write since creation, oldest first
    pub fn writes(&self) -> Vec<FragmentWrite> {
        self.inner.lock().map(|inner| inner.writes.clone()).unwrap_or_default()
    }

    /// Make the next `n` writes fail
    pub fn fail_next_writes(&self, n: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures = n;
        }
    }

    fn write(&self, write: FragmentWrite) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut inner = self.inner.lock().map_err(|_| "Fragment store lock is poisoned")?;
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err("Mocked fragment write failure".into());
        }
        inner.current = match &write {
            FragmentWrite::Replaced(value) => value.clone(),
            FragmentWrite::Cleared => String::new(),
        };
        inner.writes.push(write);
        Ok(())
    }
}

impl FragmentStore for MemoryFragment {
    fn read(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let inner = self.inner.lock().map_err(|_| "Fragment store lock is poisoned")?;
        Ok(inner.current.clone())
    }

    fn replace(&self, fragment: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write(FragmentWrite::Replaced(fragment.to_string()))
    }

    fn clear(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write(FragmentWrite::Cleared)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_recorded_and_shared() {
        let store = MemoryFragment::with_content("#abc");
        assert_eq!(store.read().unwrap(), "abc");

        let handle = store.clone();
        store.replace("def").unwrap();
        store.clear().unwrap();
        assert_eq!(handle.current(), "");
        assert_eq!(handle.writes(), vec![FragmentWrite::Replaced("def".to_string()), FragmentWrite::Cleared]);
    }

    #[test]
    fn mocked_failures() {
        let store = MemoryFragment::new();
        store.fail_next_writes(1);
        assert!(store.replace("x").is_err());
        assert!(store.writes().is_empty());
        store.replace("y").unwrap();
        assert_eq!(store.current(), "y");
    }
}
