use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// An error writing to a [`KeyValueStorage`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The storage area is full.
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// The storage area cannot be used, e.g. because it is disabled by the user.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A string-keyed storage area with the semantics of `window.localStorage`.
///
/// Writes to a single key are atomic. Implementations take `&self` because the underlying area is
/// shared between all components of a page, and between tabs of the same origin.
pub trait KeyValueStorage: Send + Sync {
    /// Returns the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing a previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`, if any.
    fn remove_item(&self, key: &str);
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Arc<T> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) {
        (**self).remove_item(key)
    }
}

/// An in-memory [`KeyValueStorage`].
///
/// Clones share the same storage area, which makes it usable to simulate several tabs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Creates an empty storage area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage area that rejects writes once the sum of key and value lengths
    /// would exceed `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Default::default(),
            quota: Some(quota),
        }
    }

    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock();

        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();

            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_items() {
        let storage = MemoryStorage::new();
        let other_tab = storage.clone();

        storage.set_item("k", "v").unwrap();
        assert_eq!(other_tab.get_item("k").as_deref(), Some("v"));

        other_tab.remove_item("k");
        assert!(storage.is_empty());
    }

    #[test]
    fn test_quota() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("k", "1234").unwrap();
        // Replacing a value only counts the new value.
        storage.set_item("k", "1234567").unwrap();
        assert_eq!(
            storage.set_item("other", "1"),
            Err(StorageError::QuotaExceeded)
        );
        assert_eq!(storage.len(), 1);
    }
}
