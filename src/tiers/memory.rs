//! Last-resort in-memory tier. Its contents live exactly as long as the
//! [`MemoryStore`] value, which the service owns for one page load.

use std::sync::Mutex;

use crate::error::StoreError;
use crate::review_model::ReviewRecord;
use crate::tiers::{CollectionStore, TierKind};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ReviewRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    fn is_available(&self) -> bool {
        !self.records.is_poisoned()
    }

    fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| StoreError::Unavailable(TierKind::Memory))
    }

    fn write_collection(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable(TierKind::Memory))?;
        *guard = records.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write_collection(&[])
    }
}
