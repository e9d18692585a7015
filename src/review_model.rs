//! Data model definitions for review storage.
//!
//! [`ReviewSubmission`] is the raw form payload handed over by the host UI.
//! It becomes a [`ReviewCandidate`] once the pipeline stamps it with an id,
//! a timestamp and client metadata, and a [`ReviewRecord`] once it passes
//! validation. Only `ReviewRecord` is ever written to a storage tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of user agent characters kept on a record.
pub const USER_AGENT_MAX_CHARS: usize = 100;

/// A validated customer review as persisted in every storage tier.
///
/// Records are immutable once created; tiers hold independent copies.
/// Field names follow the collection format shared with the remote store
/// (`userAgent`, `sessionId`).
///
/// ```rust
/// use review_vault_core::review_model::ReviewRecord;
///
/// let json = r#"{
///     "id": "r-1",
///     "name": "Ana",
///     "rating": 5,
///     "content": "Great service, very punctual!",
///     "timestamp": "2024-05-01T10:00:00Z"
/// }"#;
/// let record: ReviewRecord = serde_json::from_str(json)?;
/// assert_eq!(record.email, "");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub vehicle: String,
    pub rating: u8,
    pub content: String,
    /// Creation time; drives ordering and the duplicate window.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub session_id: String,
}

/// Rating as it arrives from a form: either a JSON number or the text of a
/// select/radio input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Number(f64),
    Text(String),
}

impl RatingInput {
    /// Returns the rating when it is a whole number in `1..=5`.
    pub fn as_stars(&self) -> Option<u8> {
        let value = match self {
            RatingInput::Number(n) => *n,
            RatingInput::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
            return None;
        }
        Some(value as u8)
    }
}

impl From<u8> for RatingInput {
    fn from(value: u8) -> Self {
        RatingInput::Number(f64::from(value))
    }
}

/// Form payload. Field names are fixed by the form contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vehicle_rented: Option<String>,
    #[serde(default)]
    pub rating: Option<RatingInput>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A submission stamped with identity and client metadata, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCandidate {
    pub id: String,
    pub submission: ReviewSubmission,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub session_id: String,
}

impl ReviewCandidate {
    pub fn new(
        submission: ReviewSubmission,
        timestamp: DateTime<Utc>,
        user_agent: &str,
        session_id: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission,
            timestamp,
            user_agent: truncate_chars(user_agent, USER_AGENT_MAX_CHARS),
            session_id: session_id.to_string(),
        }
    }
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
