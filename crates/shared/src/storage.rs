//! Durable key/value storage.
//!
//! `LocalStorage` is the string-keyed, string-valued store every persisted
//! piece of client state goes through. `Database` is the SQLite-backed
//! implementation; `MemoryStorage` backs tests and `--ephemeral` runs.

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// String key/value storage that survives across sessions
pub trait LocalStorage {
    /// Read a value, `None` if the key was never written or was removed
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

impl<S: LocalStorage + ?Sized> LocalStorage for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}

/// In-memory storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// Read a JSON value from storage.
///
/// Unreadable or corrupt values are logged and treated as absent.
pub fn read_json<T: DeserializeOwned>(storage: &impl LocalStorage, key: &str) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key = key, error = %e, "Failed to read from storage");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = key, error = %e, "Ignoring corrupt storage value");
            None
        }
    }
}

/// Read a plain string value, logging read failures as absent
pub fn read_string(storage: &impl LocalStorage, key: &str) -> Option<String> {
    storage.get_item(key).unwrap_or_else(|e| {
        warn!(key = key, error = %e, "Failed to read from storage");
        None
    })
}

/// Write a JSON value, logging instead of failing
pub fn write_json<T: Serialize + ?Sized>(storage: &mut impl LocalStorage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => write_string(storage, key, &raw),
        Err(e) => warn!(key = key, error = %e, "Failed to serialize storage value"),
    }
}

/// Write a plain string value, logging instead of failing
pub fn write_string(storage: &mut impl LocalStorage, key: &str, value: &str) {
    if let Err(e) = storage.set_item(key, value) {
        warn!(key = key, error = %e, "Failed to write to storage");
    }
}

/// Remove a value, logging instead of failing
pub fn remove(storage: &mut impl LocalStorage, key: &str) {
    if let Err(e) = storage.remove_item(key) {
        warn!(key = key, error = %e, "Failed to remove from storage");
    }
}
