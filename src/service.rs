//! Submission pipeline and store lifecycle.
//!
//! [`ReviewService`] owns every tier for one host session and wires the
//! validator, duplicate check, rate limiter, writer and reader together.

use std::sync::Arc;

use chrono::NaiveDate;
use log::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ReviewConfig;
use crate::dedup::is_duplicate;
use crate::error::{StoreError, SubmitError};
use crate::export::{export_collection, ExportDocument};
use crate::notice::{Notice, NoticeBoard, NoticeKind};
use crate::orchestrator::PersistOrchestrator;
use crate::rate_limit::RateLimiter;
use crate::reconciler::{sort_newest_first, ReadReconciler};
use crate::review_model::{ReviewCandidate, ReviewRecord, ReviewSubmission};
use crate::tiers::durable::LmdbStore;
use crate::tiers::memory::MemoryStore;
use crate::tiers::remote::RemoteStore;
use crate::tiers::session::SessionStore;
use crate::tiers::{
    CollectionStore, FallbackKeyValue, KeyValueStore, KeyedCollection, TierChain, TierKind, LAST_SUBMISSION_KEY,
    REVIEWS_BACKUP_KEY, REVIEWS_KEY, SESSION_ID_KEY, TEMP_REVIEWS_KEY,
};
use crate::validation::validate;

const SUCCESS_MESSAGE: &str = "Thank you! Your review has been submitted.";

pub struct ReviewService {
    config: ReviewConfig,
    clock: Arc<dyn Clock>,
    durable: Option<Arc<LmdbStore>>,
    local: Option<Arc<KeyedCollection>>,
    session: Arc<SessionStore>,
    session_tier: Arc<KeyedCollection>,
    memory: Arc<MemoryStore>,
    remote: Option<Arc<dyn CollectionStore>>,
    orchestrator: PersistOrchestrator,
    reconciler: ReadReconciler,
    rate_limiter: RateLimiter,
    notices: NoticeBoard,
}

impl ReviewService {
    /// Opens the store with the system clock and, when configured, the HTTP
    /// remote tier.
    pub fn open(config: ReviewConfig) -> Self {
        let remote: Option<Arc<dyn CollectionStore>> = if config.remote.is_active() {
            Some(Arc::new(RemoteStore::new(config.remote.clone())))
        } else {
            None
        };
        Self::open_with(config, Arc::new(SystemClock), remote)
    }

    /// Opens the store with an explicit clock and remote tier.
    ///
    /// A durable tier that cannot be opened is logged and left out of the
    /// chain; the session and memory tiers still take writes.
    pub fn open_with(config: ReviewConfig, clock: Arc<dyn Clock>, remote: Option<Arc<dyn CollectionStore>>) -> Self {
        let config = config.normalized();
        let durable = match LmdbStore::init(&config.db_path, config.local_quota_bytes) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("❌ Durable review store unavailable, continuing without it: {e}");
                None
            }
        };
        let local = durable.as_ref().map(|store| {
            let kv: Arc<dyn KeyValueStore> = store.clone();
            Arc::new(KeyedCollection::new(kv, REVIEWS_KEY).with_backup(REVIEWS_BACKUP_KEY))
        });

        let session = Arc::new(SessionStore::new());
        let session_tier = Arc::new(KeyedCollection::new(session.clone(), TEMP_REVIEWS_KEY));
        let memory = Arc::new(MemoryStore::new());

        let mut chain = TierChain::new();
        if let Some(remote) = remote.as_ref() {
            chain = chain.push(remote.clone());
        }
        if let Some(local) = local.as_ref() {
            chain = chain.push(local.clone());
        }
        chain = chain.push(session_tier.clone()).push(memory.clone());
        info!("Review store tiers: {:?}", chain.kinds());

        let limiter_store: Arc<dyn KeyValueStore> = match durable.as_ref() {
            Some(store) => Arc::new(FallbackKeyValue::new(store.clone(), session.clone())),
            None => session.clone(),
        };

        Self {
            orchestrator: PersistOrchestrator::new(
                chain.clone(),
                clock.clone(),
                config.local_capacity,
                config.duplicate_window_ms,
                config.retry,
            ),
            reconciler: ReadReconciler::new(chain),
            rate_limiter: RateLimiter::new(limiter_store, clock.clone(), config.rate_limit_ms),
            notices: NoticeBoard::new(config.notice_ttl_ms),
            config,
            clock,
            durable,
            local,
            session,
            session_tier,
            memory,
            remote,
        }
    }

    /// Runs the whole submission pipeline and posts exactly one notice.
    pub fn submit(&self, submission: ReviewSubmission) -> Result<ReviewRecord, SubmitError> {
        let candidate = ReviewCandidate::new(
            submission,
            self.clock.now(),
            &self.config.user_agent,
            &self.session_id(),
        );
        let result = self.submit_candidate(&candidate);

        let now = self.clock.now();
        match &result {
            Ok(_) => self.notices.show(NoticeKind::Success, SUCCESS_MESSAGE, now),
            Err(e) => self.notices.show(NoticeKind::Error, e.to_string(), now),
        }
        result
    }

    fn submit_candidate(&self, candidate: &ReviewCandidate) -> Result<ReviewRecord, SubmitError> {
        let record = validate(candidate)?;

        if is_duplicate(&record, &self.reconciler.read_all(), self.config.duplicate_window_ms) {
            info!("Submission from {} matches a recent review", record.name);
            return Err(SubmitError::DuplicateRejected);
        }

        if let Some(remaining_ms) = self.rate_limiter.remaining_ms() {
            let remaining_secs = (remaining_ms as u64).div_ceil(1_000);
            return Err(SubmitError::RateLimited { remaining_secs });
        }

        self.orchestrator.persist(&record)?;
        self.rate_limiter.record_submission();
        Ok(record)
    }

    /// Newest reviews, capped at the display limit.
    pub fn reviews(&self) -> Vec<ReviewRecord> {
        self.reconciler.read_for_display(self.config.display_limit)
    }

    /// Every reachable review, newest first.
    pub fn all_reviews(&self) -> Vec<ReviewRecord> {
        self.reconciler.read_all()
    }

    pub fn current_notice(&self) -> Option<Notice> {
        self.notices.current(self.clock.now())
    }

    /// Serializes the durable collection for download.
    pub fn export(&self, date: NaiveDate) -> Result<ExportDocument, StoreError> {
        let local = self.local_tier()?;
        let mut records = match local.read_collection() {
            Err(StoreError::MalformedData { detail, .. }) => {
                warn!("Exporting empty collection, stored data is malformed: {detail}");
                Vec::new()
            }
            other => other?,
        };
        sort_newest_first(&mut records);
        export_collection(&records, date).map_err(|e| StoreError::Backend {
            tier: TierKind::Durable,
            detail: format!("failed to serialize export: {e}"),
        })
    }

    /// Overwrites the durable collection with its backup copy. Returns how
    /// many reviews were restored.
    pub fn restore_backup(&self) -> Result<usize, StoreError> {
        let local = self.local_tier()?;
        let backup = local.read_backup()?;
        local.write_collection(&backup)?;
        info!("Restored {} reviews from backup", backup.len());
        Ok(backup.len())
    }

    /// Removes every locally held review and the rate-limit marker. The
    /// shared remote collection is left alone.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        if let Some(durable) = self.durable.as_ref() {
            let dropped = durable.clear_all_records()?;
            info!("Cleared {dropped} durable entries");
        }
        self.session_tier.clear()?;
        self.session.remove(LAST_SUBMISSION_KEY)?;
        self.memory.clear()?;
        self.notices.dismiss();
        info!("All local reviews cleared");
        Ok(())
    }

    /// Closes the durable environment. Later writes fall through to the
    /// session and memory tiers.
    pub fn close(&self) -> Result<(), StoreError> {
        match self.durable.as_ref() {
            Some(durable) => durable.close_database(),
            None => Ok(()),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn local_tier(&self) -> Result<&Arc<KeyedCollection>, StoreError> {
        self.local
            .as_ref()
            .filter(|local| local.is_available())
            .ok_or(StoreError::Unavailable(TierKind::Durable))
    }

    /// Stable identifier for this session, created on first use.
    fn session_id(&self) -> String {
        if let Ok(Some(existing)) = self.session.get(SESSION_ID_KEY) {
            return existing;
        }
        let id = format!("session_{}", uuid::Uuid::new_v4().simple());
        if let Err(e) = self.session.set(SESSION_ID_KEY, &id) {
            warn!("Could not store session id: {e}");
        }
        id
    }
}
