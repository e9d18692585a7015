//! Write path of the fallback chain.
//!
//! Tiers are tried in chain order and each kind has its own write policy:
//!
//! - **remote**: read, prepend, truncate, write back; on success mirror the
//!   same collection into the durable tier.
//! - **durable**: read-modify-write with duplicate suppression, capacity
//!   eviction, quota relief and retry with backoff.
//! - **session**: prepend into a small unbounded temporary collection.
//! - **memory**: append; only fails if its lock is poisoned.
//!
//! A duplicate stops the whole operation. Any other failure falls through to
//! the next tier.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::dedup::is_duplicate;
use crate::error::{PersistError, StoreError};
use crate::eviction::{prepend_bounded, relieve_quota};
use crate::retry::{retry_with_backoff, Attempt, RetryPolicy};
use crate::review_model::ReviewRecord;
use crate::tiers::{CollectionStore, TierChain, TierKind};

#[derive(Debug)]
enum StageError {
    Duplicate,
    Store(StoreError),
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        StageError::Store(err)
    }
}

pub struct PersistOrchestrator {
    chain: TierChain,
    clock: Arc<dyn Clock>,
    capacity: usize,
    duplicate_window_ms: i64,
    retry: RetryPolicy,
}

impl PersistOrchestrator {
    pub fn new(
        chain: TierChain,
        clock: Arc<dyn Clock>,
        capacity: usize,
        duplicate_window_ms: i64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            clock,
            capacity,
            duplicate_window_ms,
            retry,
        }
    }

    /// Persists `record` into the first tier that accepts it and returns
    /// that tier's kind.
    pub fn persist(&self, record: &ReviewRecord) -> Result<TierKind, PersistError> {
        for tier in self.chain.iter() {
            let kind = tier.kind();
            if !tier.is_available() {
                debug!("Skipping unavailable {kind} tier");
                continue;
            }

            let outcome = match kind {
                TierKind::Remote => self.write_remote(tier.as_ref(), record),
                TierKind::Durable => self.write_durable(tier.as_ref(), record),
                TierKind::Session => write_prepend(tier.as_ref(), record),
                TierKind::Memory => write_append(tier.as_ref(), record),
            };

            match outcome {
                Ok(()) => {
                    info!("Review {} stored in {kind} tier", record.id);
                    return Ok(kind);
                }
                Err(StageError::Duplicate) => {
                    info!("Review from {} rejected as duplicate", record.name);
                    return Err(PersistError::DuplicateRejected);
                }
                Err(StageError::Store(e)) => {
                    warn!("Write to {kind} tier failed, falling through: {e}");
                }
            }
        }

        warn!("❌ No tier accepted review {}", record.id);
        Err(PersistError::StorageUnavailable)
    }

    fn write_remote(&self, tier: &dyn CollectionStore, record: &ReviewRecord) -> Result<(), StageError> {
        let mut records = match tier.read_collection() {
            Ok(records) => records,
            Err(e) => {
                warn!("Remote read failed, starting from an empty collection: {e}");
                Vec::new()
            }
        };
        if is_duplicate(record, &records, self.duplicate_window_ms) {
            return Err(StageError::Duplicate);
        }
        prepend_bounded(&mut records, record.clone(), self.capacity);
        tier.write_collection(&records)?;

        if let Some(local) = self.chain.first_of(TierKind::Durable) {
            if local.is_available() {
                if let Err(e) = self.write_with_quota_relief(local.as_ref(), &records, BackupMode::Mirror) {
                    warn!("Mirroring remote collection to {} tier failed: {e}", local.kind());
                }
            }
        }
        Ok(())
    }

    fn write_durable(&self, tier: &dyn CollectionStore, record: &ReviewRecord) -> Result<(), StageError> {
        retry_with_backoff(&self.retry, self.clock.as_ref(), |attempt| {
            let mut records = read_self_healing(tier).map_err(|e| Attempt::Retry(StageError::Store(e)))?;
            if is_duplicate(record, &records, self.duplicate_window_ms) {
                return Err(Attempt::Abort(StageError::Duplicate));
            }
            let evicted = prepend_bounded(&mut records, record.clone(), self.capacity);
            if evicted > 0 {
                debug!("Evicted {evicted} oldest reviews to stay within capacity");
            }

            // The backup only ever gains records here, so reviews lost with a
            // malformed primary stay recoverable.
            let written = self.write_with_quota_relief(tier, &records, BackupMode::Keep);
            if written.is_ok() {
                if let Err(e) = tier.fold_into_backup(record, self.capacity) {
                    warn!("Could not add review {} to the backup: {e}", record.id);
                }
            }
            written.map_err(|e| {
                warn!("Durable write attempt {} failed: {e}", attempt + 1);
                Attempt::Retry(StageError::Store(e))
            })
        })
    }

    /// Writes `records`; on a quota error retries once with the reduced set.
    fn write_with_quota_relief(
        &self,
        tier: &dyn CollectionStore,
        records: &[ReviewRecord],
        mode: BackupMode,
    ) -> Result<(), StoreError> {
        let write = |records: &[ReviewRecord]| match mode {
            BackupMode::Mirror => tier.write_collection(records),
            BackupMode::Keep => tier.write_primary(records),
        };
        match write(records) {
            Err(e) if e.is_quota() => {
                let reduced = relieve_quota(records, self.capacity);
                warn!(
                    "Quota exceeded on {} tier, keeping only the newest {} reviews",
                    tier.kind(),
                    reduced.len()
                );
                write(&reduced)
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BackupMode {
    Mirror,
    Keep,
}

fn write_prepend(tier: &dyn CollectionStore, record: &ReviewRecord) -> Result<(), StageError> {
    let mut records = read_self_healing(tier)?;
    records.insert(0, record.clone());
    tier.write_collection(&records)?;
    Ok(())
}

fn write_append(tier: &dyn CollectionStore, record: &ReviewRecord) -> Result<(), StageError> {
    let mut records = read_self_healing(tier)?;
    records.push(record.clone());
    tier.write_collection(&records)?;
    Ok(())
}

/// Reads a tier, replacing malformed content with an empty collection.
fn read_self_healing(tier: &dyn CollectionStore) -> Result<Vec<ReviewRecord>, StoreError> {
    match tier.read_collection() {
        Err(StoreError::MalformedData { tier: kind, detail }) => {
            warn!("Discarding malformed {kind} collection: {detail}");
            Ok(Vec::new())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tiers::memory::MemoryStore;
    use crate::tiers::session::SessionStore;
    use crate::tiers::{KeyValueStore, KeyedCollection, REVIEWS_BACKUP_KEY, REVIEWS_KEY, TEMP_REVIEWS_KEY};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Tier that fails every call and counts writes.
    struct BrokenTier {
        kind: TierKind,
        writes: AtomicUsize,
    }

    impl BrokenTier {
        fn new(kind: TierKind) -> Self {
            Self { kind, writes: AtomicUsize::new(0) }
        }
    }

    impl CollectionStore for BrokenTier {
        fn kind(&self) -> TierKind {
            self.kind
        }
        fn is_available(&self) -> bool {
            true
        }
        fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError> {
            Err(StoreError::Unavailable(self.kind))
        }
        fn write_collection(&self, _records: &[ReviewRecord]) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend { tier: self.kind, detail: "offline".to_string() })
        }
        fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Remote stand-in keeping its blob in memory.
    #[derive(Default)]
    struct FakeRemote {
        blob: Mutex<Vec<ReviewRecord>>,
    }

    impl CollectionStore for FakeRemote {
        fn kind(&self) -> TierKind {
            TierKind::Remote
        }
        fn is_available(&self) -> bool {
            true
        }
        fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError> {
            Ok(self.blob.lock().unwrap().clone())
        }
        fn write_collection(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
            *self.blob.lock().unwrap() = records.to_vec();
            Ok(())
        }
        fn clear(&self) -> Result<(), StoreError> {
            self.write_collection(&[])
        }
    }

    /// Key-value store refusing values longer than `limit` bytes.
    struct QuotaStore {
        inner: SessionStore,
        limit: usize,
    }

    impl KeyValueStore for QuotaStore {
        fn kind(&self) -> TierKind {
            TierKind::Durable
        }
        fn is_available(&self) -> bool {
            true
        }
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if value.len() > self.limit {
                return Err(StoreError::QuotaExceeded { tier: TierKind::Durable, bytes: value.len() });
            }
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()))
    }

    fn record(i: usize) -> ReviewRecord {
        ReviewRecord {
            id: format!("r-{i}"),
            name: format!("Customer {i}"),
            email: String::new(),
            location: String::new(),
            vehicle: String::new(),
            rating: 4,
            content: format!("Review number {i} about a smooth rental"),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(i as i64),
            user_agent: String::new(),
            session_id: String::new(),
        }
    }

    fn durable() -> Arc<KeyedCollection> {
        Arc::new(KeyedCollection::new(Arc::new(SessionStore::new()), REVIEWS_KEY).with_backup(REVIEWS_BACKUP_KEY))
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, base_delay_ms: 100, max_jitter_ms: 0 }
    }

    fn orchestrator(chain: TierChain, clock: Arc<ManualClock>) -> PersistOrchestrator {
        PersistOrchestrator::new(chain, clock, 100, 86_400_000, fast_retry())
    }

    #[test]
    fn durable_tier_keeps_latest_hundred() {
        let local = durable();
        let orch = orchestrator(TierChain::new().push(local.clone()), clock());

        for i in 0..130 {
            assert_eq!(orch.persist(&record(i)).unwrap(), TierKind::Durable);
        }

        let stored = local.read_collection().unwrap();
        assert_eq!(stored.len(), 100);
        assert_eq!(stored[0].id, "r-129");
        assert_eq!(stored[99].id, "r-30");
    }

    #[test]
    fn duplicate_aborts_without_fallback() {
        let local = durable();
        let memory = Arc::new(MemoryStore::new());
        let orch = orchestrator(TierChain::new().push(local.clone()).push(memory.clone()), clock());

        orch.persist(&record(1)).unwrap();
        let mut again = record(1);
        again.id = "r-1-again".to_string();

        assert_eq!(orch.persist(&again), Err(PersistError::DuplicateRejected));
        assert!(memory.read_collection().unwrap().is_empty());
        assert_eq!(local.read_collection().unwrap().len(), 1);
    }

    #[test]
    fn remote_success_is_mirrored_locally() {
        let remote = Arc::new(FakeRemote::default());
        let local = durable();
        let orch = orchestrator(TierChain::new().push(remote.clone()).push(local.clone()), clock());

        assert_eq!(orch.persist(&record(1)).unwrap(), TierKind::Remote);
        assert_eq!(orch.persist(&record(2)).unwrap(), TierKind::Remote);

        assert_eq!(remote.read_collection().unwrap().len(), 2);
        let mirrored = local.read_collection().unwrap();
        assert_eq!(mirrored.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r-2", "r-1"]);
    }

    #[test]
    fn remote_duplicate_is_rejected() {
        let remote = Arc::new(FakeRemote::default());
        let orch = orchestrator(TierChain::new().push(remote.clone()).push(durable()), clock());

        orch.persist(&record(1)).unwrap();
        assert_eq!(orch.persist(&record(1)), Err(PersistError::DuplicateRejected));
    }

    #[test]
    fn failing_remote_falls_through_to_local() {
        let remote = Arc::new(BrokenTier::new(TierKind::Remote));
        let local = durable();
        let orch = orchestrator(TierChain::new().push(remote.clone()).push(local.clone()), clock());

        assert_eq!(orch.persist(&record(1)).unwrap(), TierKind::Durable);
        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);
        assert_eq!(local.read_collection().unwrap()[0].id, "r-1");
    }

    #[test]
    fn broken_local_retries_with_backoff_then_uses_session() {
        let clock = clock();
        let start = clock.now();
        let local = Arc::new(BrokenTier::new(TierKind::Durable));
        let session = Arc::new(KeyedCollection::new(Arc::new(SessionStore::new()), TEMP_REVIEWS_KEY));
        let orch = orchestrator(TierChain::new().push(local).push(session.clone()), clock.clone());

        assert_eq!(orch.persist(&record(1)).unwrap(), TierKind::Session);
        assert_eq!(session.read_collection().unwrap().len(), 1);
        // 100ms + 200ms between three attempts, nothing after the last.
        assert_eq!((clock.now() - start).num_milliseconds(), 300);
    }

    #[test]
    fn memory_is_the_last_resort() {
        let memory = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            TierChain::new()
                .push(Arc::new(BrokenTier::new(TierKind::Durable)))
                .push(Arc::new(BrokenTier::new(TierKind::Session)))
                .push(memory.clone()),
            clock(),
        );

        orch.persist(&record(1)).unwrap();
        orch.persist(&record(2)).unwrap();
        let stored = memory.read_collection().unwrap();
        assert_eq!(stored.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r-1", "r-2"]);
    }

    #[test]
    fn empty_chain_is_unavailable() {
        let orch = orchestrator(TierChain::new(), clock());
        assert_eq!(orch.persist(&record(1)), Err(PersistError::StorageUnavailable));
    }

    #[test]
    fn quota_pressure_shrinks_collection() {
        let size_of = |n: usize| serde_json::to_string(&(0..n).map(record).collect::<Vec<_>>()).unwrap().len();
        let store = Arc::new(QuotaStore { inner: SessionStore::new(), limit: size_of(50) });
        let local = Arc::new(KeyedCollection::new(store, REVIEWS_KEY));
        let orch = orchestrator(TierChain::new().push(local.clone()), clock());

        for i in 0..60 {
            assert_eq!(orch.persist(&record(i)).unwrap(), TierKind::Durable);
        }

        let stored = local.read_collection().unwrap();
        assert!(stored.len() < 50, "collection should have been cut back, has {}", stored.len());
        assert_eq!(stored[0].id, "r-59");
    }

    #[test]
    fn malformed_primary_leaves_backup_recoverable() {
        let local = durable();
        let orch = orchestrator(TierChain::new().push(local.clone()), clock());
        for i in 0..3 {
            orch.persist(&record(i)).unwrap();
        }

        let kv = Arc::new(SessionStore::new());
        kv.set(REVIEWS_KEY, "<<garbage>>").unwrap();
        kv.set(REVIEWS_BACKUP_KEY, &serde_json::to_string(&local.read_backup().unwrap()).unwrap()).unwrap();
        let healed = Arc::new(KeyedCollection::new(kv, REVIEWS_KEY).with_backup(REVIEWS_BACKUP_KEY));
        let orch = orchestrator(TierChain::new().push(healed.clone()), clock());

        assert_eq!(orch.persist(&record(3)).unwrap(), TierKind::Durable);

        assert_eq!(healed.read_collection().unwrap().len(), 1);
        let backup: Vec<_> = healed.read_backup().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(backup, ["r-3", "r-2", "r-1", "r-0"]);

        orch.persist(&record(4)).unwrap();
        assert_eq!(healed.read_collection().unwrap().len(), 2);
        assert_eq!(healed.read_backup().unwrap().len(), 5);
    }

    #[test]
    fn malformed_local_data_is_overwritten() {
        let kv = Arc::new(SessionStore::new());
        kv.set(REVIEWS_KEY, "<<garbage>>").unwrap();
        let local = Arc::new(KeyedCollection::new(kv, REVIEWS_KEY));
        let orch = orchestrator(TierChain::new().push(local.clone()), clock());

        assert_eq!(orch.persist(&record(1)).unwrap(), TierKind::Durable);
        assert_eq!(local.read_collection().unwrap().len(), 1);
    }
}
