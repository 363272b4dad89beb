//! Override store
//!
//! Maps message identifiers to replacement text. The in-memory map is
//! authoritative for the session; every write is persisted immediately as a
//! single JSON object under one storage key, and a failed persist leaves the
//! in-memory state untouched.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::identity::MessageId;

/// String-keyed persistent storage (`window.localStorage` in a browser)
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local storage, used in tests and when no persistent storage exists
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for &S {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }
}

pub struct OverrideStore<S> {
    storage: S,
    key: String,
    overrides: BTreeMap<MessageId, String>,
}

impl<S: KeyValueStorage> OverrideStore<S> {
    /// Create an empty store; call [`OverrideStore::load_all`] to read persisted overrides
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the in-memory map with the persisted one
    ///
    /// On any failure the map is left empty and the error returned, so the
    /// session continues with no overrides.
    pub fn load_all(&mut self) -> Result<usize, StorageError> {
        self.overrides.clear();
        let Some(raw) = self.storage.get_item(&self.key)? else {
            return Ok(0);
        };
        let parsed: BTreeMap<MessageId, String> =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        self.overrides = parsed;
        debug!(count = self.overrides.len(), "Loaded local overrides");
        Ok(self.overrides.len())
    }

    /// Persist the whole map
    pub fn save(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.overrides)
            .map_err(|e| StorageError::Write(e.to_string()))?;
        self.storage.set_item(&self.key, &json)
    }

    pub fn get(&self, id: &MessageId) -> Option<&str> {
        self.overrides.get(id).map(String::as_str)
    }

    /// Store an override and persist; the in-memory value is kept even if persisting fails
    pub fn set(&mut self, id: MessageId, text: impl Into<String>) -> Result<(), StorageError> {
        self.overrides.insert(id, text.into());
        self.persist()
    }

    /// Remove an override and persist, returning the previous text
    pub fn remove(&mut self, id: &MessageId) -> Result<Option<String>, StorageError> {
        let previous = self.overrides.remove(id);
        self.persist().map(|_| previous)
    }

    /// Drop every override and persist the empty map
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.overrides.clear();
        self.persist()
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.save().inspect_err(|e| {
            warn!(error = %e, "Failed to persist local overrides; keeping them in memory");
        })
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MessageId, &str)> {
        self.overrides.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: set then get returns the stored text
        #[test]
        fn set_then_get(key in "[a-z0-9:]{1,20}", text in ".*") {
            let mut store = OverrideStore::new(MemoryStorage::new(), "k");
            store.set(MessageId::new(key.clone()), text.clone()).unwrap();
            prop_assert_eq!(store.get(&MessageId::new(key)), Some(text.as_str()));
        }

        /// Property: a fresh load reproduces whatever was saved
        #[test]
        fn save_load_round_trip(
            entries in prop::collection::btree_map("[a-z0-9:]{1,12}", ".*", 0..8)
        ) {
            let storage = MemoryStorage::new();
            let mut store = OverrideStore::new(&storage, "k");
            for (k, v) in &entries {
                store.set(MessageId::new(k.clone()), v.clone()).unwrap();
            }

            let mut fresh = OverrideStore::new(&storage, "k");
            fresh.load_all().unwrap();
            let loaded: BTreeMap<String, String> = fresh
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_string()))
                .collect();
            prop_assert_eq!(loaded, entries);
        }
    }
}
