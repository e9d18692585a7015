//! Session-scoped key-value store, alive for the lifetime of one host session.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::tiers::{KeyValueStore, TierKind};

#[derive(Debug, Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable(TierKind::Session))
    }
}

impl KeyValueStore for SessionStore {
    fn kind(&self) -> TierKind {
        TierKind::Session
    }

    fn is_available(&self) -> bool {
        !self.entries.is_poisoned()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}
