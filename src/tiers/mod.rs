//! Storage tiers of the fallback chain.
//!
//! Every tier is reachable through [`CollectionStore`], which treats the
//! whole review collection as one value: readers get the full list, writers
//! replace it. Flat string-keyed backends implement [`KeyValueStore`] and are
//! lifted to a collection by [`KeyedCollection`].

pub mod durable;
pub mod memory;
pub mod remote;
pub mod session;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::eviction::{prepend_bounded, relieve_quota};
use crate::review_model::ReviewRecord;

/// Key holding the serialized review collection.
pub const REVIEWS_KEY: &str = "customerReviews";
/// Key holding a backup copy of [`REVIEWS_KEY`].
pub const REVIEWS_BACKUP_KEY: &str = "customerReviews_backup";
/// Key holding the last accepted submission time (milliseconds since epoch).
pub const LAST_SUBMISSION_KEY: &str = "lastReviewSubmission";
/// Session key for the small temporary collection.
pub const TEMP_REVIEWS_KEY: &str = "tempReviews";
/// Session key for the stable per-session identifier.
pub const SESSION_ID_KEY: &str = "reviewSessionId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Remote,
    Durable,
    Session,
    Memory,
}

impl Display for TierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TierKind::Remote => "remote",
            TierKind::Durable => "durable local",
            TierKind::Session => "session",
            TierKind::Memory => "in-memory",
        };
        f.write_str(name)
    }
}

/// A storage tier holding the review collection as a single value.
pub trait CollectionStore: Send + Sync {
    fn kind(&self) -> TierKind;

    fn is_available(&self) -> bool;

    /// Reads the whole collection. A missing value is an empty collection.
    fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError>;

    /// Replaces the whole collection.
    fn write_collection(&self, records: &[ReviewRecord]) -> Result<(), StoreError>;

    /// Replaces the collection but leaves any backup copy untouched.
    fn write_primary(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
        self.write_collection(records)
    }

    /// Adds `record` to the backup copy, newest first and bounded by
    /// `capacity`. Stores without a backup do nothing.
    fn fold_into_backup(&self, _record: &ReviewRecord, _capacity: usize) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError>;
}

/// A flat string-keyed store with string values.
pub trait KeyValueStore: Send + Sync {
    fn kind(&self) -> TierKind;

    fn is_available(&self) -> bool;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Exposes one key of a [`KeyValueStore`] as a [`CollectionStore`].
///
/// When a backup key is configured every successful write is copied to it.
/// A failed backup write is logged and ignored.
pub struct KeyedCollection {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    backup_key: Option<&'static str>,
}

impl KeyedCollection {
    pub fn new(store: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self { store, key, backup_key: None }
    }

    pub fn with_backup(mut self, backup_key: &'static str) -> Self {
        self.backup_key = Some(backup_key);
        self
    }

    /// Reads the backup copy, if one is configured and present.
    pub fn read_backup(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        match self.backup_key {
            Some(key) => self.read_key(key),
            None => Ok(Vec::new()),
        }
    }

    fn read_key(&self, key: &str) -> Result<Vec<ReviewRecord>, StoreError> {
        match self.store.get(key)? {
            Some(raw) => decode_collection(self.store.kind(), &raw),
            None => Ok(Vec::new()),
        }
    }
}

impl CollectionStore for KeyedCollection {
    fn kind(&self) -> TierKind {
        self.store.kind()
    }

    fn is_available(&self) -> bool {
        self.store.is_available()
    }

    fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        self.read_key(self.key)
    }

    fn write_collection(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
        let raw = encode_collection(self.store.kind(), records)?;
        self.store.set(self.key, &raw)?;
        if let Some(backup_key) = self.backup_key {
            if let Err(e) = self.store.set(backup_key, &raw) {
                warn!("Backup write to {} tier failed: {e}", self.store.kind());
            }
        }
        Ok(())
    }

    fn write_primary(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
        let raw = encode_collection(self.store.kind(), records)?;
        self.store.set(self.key, &raw)
    }

    fn fold_into_backup(&self, record: &ReviewRecord, capacity: usize) -> Result<(), StoreError> {
        let Some(backup_key) = self.backup_key else {
            return Ok(());
        };
        let mut backup = match self.read_key(backup_key) {
            Err(StoreError::MalformedData { detail, .. }) => {
                warn!("Backup on {} tier is malformed too, restarting it: {detail}", self.store.kind());
                Vec::new()
            }
            other => other?,
        };
        prepend_bounded(&mut backup, record.clone(), capacity);
        let raw = encode_collection(self.store.kind(), &backup)?;
        match self.store.set(backup_key, &raw) {
            Err(e) if e.is_quota() => {
                let reduced = relieve_quota(&backup, capacity);
                let raw = encode_collection(self.store.kind(), &reduced)?;
                self.store.set(backup_key, &raw)
            }
            other => other,
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(self.key)?;
        if let Some(backup_key) = self.backup_key {
            self.store.remove(backup_key)?;
        }
        Ok(())
    }
}

/// Routes every call to `primary` while it is available and to `fallback`
/// otherwise.
pub struct FallbackKeyValue {
    primary: Arc<dyn KeyValueStore>,
    fallback: Arc<dyn KeyValueStore>,
}

impl FallbackKeyValue {
    pub fn new(primary: Arc<dyn KeyValueStore>, fallback: Arc<dyn KeyValueStore>) -> Self {
        Self { primary, fallback }
    }

    fn active(&self) -> &dyn KeyValueStore {
        if self.primary.is_available() {
            self.primary.as_ref()
        } else {
            self.fallback.as_ref()
        }
    }
}

impl KeyValueStore for FallbackKeyValue {
    fn kind(&self) -> TierKind {
        self.active().kind()
    }

    fn is_available(&self) -> bool {
        self.active().is_available()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.active().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.active().set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.active().remove(key)
    }
}

/// Ordered list of tiers consulted by the writer and the reader.
#[derive(Clone, Default)]
pub struct TierChain {
    tiers: Vec<Arc<dyn CollectionStore>>,
}

impl TierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, tier: Arc<dyn CollectionStore>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CollectionStore>> {
        self.tiers.iter()
    }

    /// First tier of the given kind, available or not.
    pub fn first_of(&self, kind: TierKind) -> Option<&Arc<dyn CollectionStore>> {
        self.tiers.iter().find(|t| t.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }
}

pub(crate) fn encode_collection(tier: TierKind, records: &[ReviewRecord]) -> Result<String, StoreError> {
    serde_json::to_string(records).map_err(|e| StoreError::Backend {
        tier,
        detail: format!("failed to serialize collection: {e}"),
    })
}

pub(crate) fn decode_collection(tier: TierKind, raw: &str) -> Result<Vec<ReviewRecord>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::MalformedData {
        tier,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::session::SessionStore;
    use chrono::Utc;

    fn record(id: &str) -> ReviewRecord {
        ReviewRecord {
            id: id.to_string(),
            name: "Ana".to_string(),
            email: String::new(),
            location: String::new(),
            vehicle: String::new(),
            rating: 4,
            content: "Clean car and quick pickup".to_string(),
            timestamp: Utc::now(),
            user_agent: String::new(),
            session_id: String::new(),
        }
    }

    #[test]
    fn keyed_collection_mirrors_backup() {
        let store = Arc::new(SessionStore::new());
        let collection = KeyedCollection::new(store.clone(), REVIEWS_KEY).with_backup(REVIEWS_BACKUP_KEY);

        collection.write_collection(&[record("1")]).unwrap();

        assert_eq!(collection.read_collection().unwrap().len(), 1);
        assert_eq!(collection.read_backup().unwrap()[0].id, "1");
    }

    #[test]
    fn garbage_is_reported_as_malformed() {
        let store = Arc::new(SessionStore::new());
        store.set(REVIEWS_KEY, "{not json").unwrap();
        let collection = KeyedCollection::new(store, REVIEWS_KEY);

        match collection.read_collection() {
            Err(StoreError::MalformedData { tier, .. }) => assert_eq!(tier, TierKind::Session),
            other => panic!("expected malformed data, got {other:?}"),
        }
    }

    #[test]
    fn primary_write_keeps_backup() {
        let store = Arc::new(SessionStore::new());
        let collection = KeyedCollection::new(store, REVIEWS_KEY).with_backup(REVIEWS_BACKUP_KEY);
        collection.write_collection(&[record("1"), record("2")]).unwrap();

        collection.write_primary(&[record("3")]).unwrap();
        collection.fold_into_backup(&record("3"), 100).unwrap();

        assert_eq!(collection.read_collection().unwrap().len(), 1);
        let backup: Vec<_> = collection.read_backup().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(backup, ["3", "1", "2"]);
    }

    /// Key-value store that can be switched off.
    struct Switchable {
        inner: SessionStore,
        up: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for Switchable {
        fn kind(&self) -> TierKind {
            TierKind::Durable
        }
        fn is_available(&self) -> bool {
            self.up.load(std::sync::atomic::Ordering::SeqCst)
        }
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn fallback_store_follows_primary_availability() {
        let primary = Arc::new(Switchable { inner: SessionStore::new(), up: true.into() });
        let session = Arc::new(SessionStore::new());
        let store = FallbackKeyValue::new(primary.clone(), session.clone());

        store.set("k", "durable").unwrap();
        assert_eq!(store.kind(), TierKind::Durable);

        primary.up.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(store.kind(), TierKind::Session);
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "session").unwrap();
        assert_eq!(session.get("k").unwrap().as_deref(), Some("session"));
    }

    #[test]
    fn missing_key_reads_empty() {
        let collection = KeyedCollection::new(Arc::new(SessionStore::new()), REVIEWS_KEY);
        assert!(collection.read_collection().unwrap().is_empty());
    }
}
