//! Read path of the fallback chain.

use log::{debug, warn};

use crate::error::StoreError;
use crate::review_model::ReviewRecord;
use crate::tiers::TierChain;

pub struct ReadReconciler {
    chain: TierChain,
}

impl ReadReconciler {
    pub fn new(chain: TierChain) -> Self {
        Self { chain }
    }

    /// Returns the first non-empty collection found along the chain, newest
    /// first. Unreachable tiers and malformed data are skipped; no reviews
    /// at all is an empty result, not an error.
    pub fn read_all(&self) -> Vec<ReviewRecord> {
        for tier in self.chain.iter() {
            let kind = tier.kind();
            if !tier.is_available() {
                continue;
            }
            match tier.read_collection() {
                Ok(records) if records.is_empty() => debug!("{kind} tier holds no reviews"),
                Ok(mut records) => {
                    debug!("Read {} reviews from {kind} tier", records.len());
                    sort_newest_first(&mut records);
                    return records;
                }
                Err(StoreError::MalformedData { detail, .. }) => {
                    warn!("Ignoring malformed {kind} collection: {detail}");
                }
                Err(e) => warn!("Read from {kind} tier failed: {e}"),
            }
        }
        Vec::new()
    }

    /// [`Self::read_all`] capped at `limit` entries.
    pub fn read_for_display(&self, limit: usize) -> Vec<ReviewRecord> {
        let mut records = self.read_all();
        records.truncate(limit);
        records
    }
}

/// Stable sort by timestamp, descending.
pub fn sort_newest_first(records: &mut [ReviewRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
