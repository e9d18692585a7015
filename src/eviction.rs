//! Capacity and quota eviction for newest-first collections.
//!
//! Collections are kept newest-first (new records are prepended), so
//! evicting always means truncating the tail.

use crate::review_model::ReviewRecord;

/// Drops the oldest records beyond `capacity`. Returns how many were evicted.
pub fn enforce_capacity(records: &mut Vec<ReviewRecord>, capacity: usize) -> usize {
    let evicted = records.len().saturating_sub(capacity);
    records.truncate(capacity);
    evicted
}

/// Size a collection is cut down to after the store reports quota pressure.
pub fn quota_relief_size(capacity: usize) -> usize {
    (capacity / 3).max(1)
}

/// Copy of `records` reduced to [`quota_relief_size`].
pub fn relieve_quota(records: &[ReviewRecord], capacity: usize) -> Vec<ReviewRecord> {
    records.iter().take(quota_relief_size(capacity)).cloned().collect()
}

/// Prepends `record` and enforces `capacity`.
pub fn prepend_bounded(records: &mut Vec<ReviewRecord>, record: ReviewRecord, capacity: usize) -> usize {
    records.insert(0, record);
    enforce_capacity(records, capacity)
}
