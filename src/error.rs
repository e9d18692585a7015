//! Error taxonomy for the review pipeline.
//!
//! Validation and duplicate rejection are terminal outcomes reported to the
//! submitter. Storage errors are mitigated inside the fallback chain and only
//! surface once every tier has failed.

use thiserror::Error;

use crate::tiers::TierKind;

/// Field-level validation failure. Only the first failing rule is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your name")]
    MissingName,
    #[error("Please write your review")]
    MissingContent,
    #[error("Your review must be at least 10 characters long")]
    ContentTooShort,
    #[error("Please select a rating between 1 and 5 stars")]
    InvalidRating,
}

/// Failure reported by a single storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} storage is unavailable")]
    Unavailable(TierKind),
    #[error("{tier} storage quota exceeded ({bytes} bytes)")]
    QuotaExceeded { tier: TierKind, bytes: usize },
    #[error("{tier} storage returned malformed data: {detail}")]
    MalformedData { tier: TierKind, detail: String },
    #[error("{tier} storage failure: {detail}")]
    Backend { tier: TierKind, detail: String },
}

impl StoreError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("A very similar review was already submitted recently")]
    DuplicateRejected,
    #[error("No storage tier accepted the review")]
    StorageUnavailable,
}

/// Outcome of a rejected submission, as surfaced to the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A very similar review was already submitted recently")]
    DuplicateRejected,
    #[error("Please wait {remaining_secs} seconds before submitting another review")]
    RateLimited { remaining_secs: u64 },
    #[error("Your review could not be saved, please try again later")]
    StorageUnavailable,
}

impl From<PersistError> for SubmitError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::DuplicateRejected => SubmitError::DuplicateRejected,
            PersistError::StorageUnavailable => SubmitError::StorageUnavailable,
        }
    }
}
