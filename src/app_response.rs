use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::{StoreError, SubmitError};

#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    Duplicate(String),
    RateLimited(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::Duplicate(msg) => write!(f, "Duplicate: {}", msg),
            AppResponse::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<SubmitError> for AppResponse {
    fn from(err: SubmitError) -> Self {
        let msg = err.to_string();
        match err {
            SubmitError::Validation(_) => AppResponse::ValidationError(msg),
            SubmitError::DuplicateRejected => AppResponse::Duplicate(msg),
            SubmitError::RateLimited { .. } => AppResponse::RateLimited(msg),
            SubmitError::StorageUnavailable => AppResponse::DatabaseError(msg),
        }
    }
}

impl From<StoreError> for AppResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MalformedData { .. } => AppResponse::SerializationError(err.to_string()),
            other => AppResponse::DatabaseError(other.to_string()),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::tiers::TierKind;

    #[test]
    fn submit_errors_map_to_distinct_variants() {
        assert!(matches!(
            AppResponse::from(SubmitError::Validation(ValidationError::MissingName)),
            AppResponse::ValidationError(_)
        ));
        assert!(matches!(AppResponse::from(SubmitError::DuplicateRejected), AppResponse::Duplicate(_)));
        assert!(matches!(
            AppResponse::from(SubmitError::RateLimited { remaining_secs: 12 }),
            AppResponse::RateLimited(msg) if msg.contains("12")
        ));
    }

    #[test]
    fn serializes_as_tagged_variant() {
        let json = serde_json::to_string(&AppResponse::from(StoreError::Unavailable(TierKind::Durable))).unwrap();
        assert!(json.starts_with(r#"{"DatabaseError":"#));
    }
}
