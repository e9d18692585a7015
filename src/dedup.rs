//! Time-windowed near-duplicate detection.
//!
//! The similarity test is deliberately cheap: case-insensitive name
//! equality plus either equal normalized content or containment of a
//! 20-character prefix. Near-duplicates that diverge early are missed.

use chrono::Duration;

use crate::review_model::ReviewRecord;

/// Default duplicate window, 24 hours.
pub const DUPLICATE_WINDOW_MS: i64 = 86_400_000;

const PREFIX_CHARS: usize = 20;

/// Returns `true` when any existing record inside the window looks like the
/// same review from the same author.
pub fn is_duplicate(candidate: &ReviewRecord, existing: &[ReviewRecord], window_ms: i64) -> bool {
    let window = Duration::milliseconds(window_ms);
    let name = candidate.name.trim().to_lowercase();
    let content = normalize_content(&candidate.content);

    existing.iter().any(|other| {
        let delta = (candidate.timestamp - other.timestamp).abs();
        delta < window
            && other.name.trim().to_lowercase() == name
            && similar_content(&content, &normalize_content(&other.content))
    })
}

/// Collapses whitespace runs to a single space and lower-cases.
pub fn normalize_content(content: &str) -> String {
    content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn similar_content(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a_prefix: String = a.chars().take(PREFIX_CHARS).collect();
    let b_prefix: String = b.chars().take(PREFIX_CHARS).collect();
    b.contains(&a_prefix) || a.contains(&b_prefix)
}
