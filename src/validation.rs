//! Field validation and free-text sanitization.

use crate::error::ValidationError;
use crate::review_model::{ReviewCandidate, ReviewRecord};

/// Minimum trimmed length, in characters, of a review body.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Validates a candidate and turns it into a storable record.
///
/// Rules are checked in a fixed order and the first failure wins:
/// name, content presence, content length, rating. Free-text fields are
/// sanitized with [`strip_script_tags`] before the checks run, so a body
/// made only of script markup counts as missing.
pub fn validate(candidate: &ReviewCandidate) -> Result<ReviewRecord, ValidationError> {
    let form = &candidate.submission;

    let name = clean_field(form.name.as_deref());
    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    let content = clean_field(form.content.as_deref());
    if content.is_empty() {
        return Err(ValidationError::MissingContent);
    }
    if content.chars().count() < MIN_CONTENT_CHARS {
        return Err(ValidationError::ContentTooShort);
    }

    let rating = form
        .rating
        .as_ref()
        .and_then(|r| r.as_stars())
        .ok_or(ValidationError::InvalidRating)?;

    Ok(ReviewRecord {
        id: candidate.id.clone(),
        name,
        email: clean_field(form.email.as_deref()),
        location: clean_field(form.location.as_deref()),
        vehicle: clean_field(form.vehicle_rented.as_deref()),
        rating,
        content,
        timestamp: candidate.timestamp,
        user_agent: candidate.user_agent.clone(),
        session_id: candidate.session_id.clone(),
    })
}

fn clean_field(value: Option<&str>) -> String {
    value
        .map(|v| strip_script_tags(v).trim().to_string())
        .unwrap_or_default()
}

/// Removes `<script ...> ... </script>` blocks, case-insensitively.
///
/// This is a textual transform only; escaping for markup insertion stays
/// with the rendering layer. An unterminated opening tag drops the rest of
/// the text.
pub fn strip_script_tags(input: &str) -> String {
    const OPEN: &str = "<script";
    const CLOSE: &str = "</script>";

    // ASCII lowercasing keeps byte offsets aligned with `input`.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(OPEN) {
        let start = cursor + found;
        out.push_str(&input[cursor..start]);
        match lower[start..].find(CLOSE) {
            Some(end) => cursor = start + end + CLOSE.len(),
            None => return out,
        }
    }
    out.push_str(&input[cursor..]);
    out
}
