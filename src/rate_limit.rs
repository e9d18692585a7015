//! Minimum interval between accepted submissions.
//!
//! The last submission time lives in the durable tier, or in the session
//! store while the durable tier is unavailable, so the limit applies to the
//! whole storage partition rather than to an author.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use log::warn;

use crate::clock::Clock;
use crate::tiers::{KeyValueStore, LAST_SUBMISSION_KEY};

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    interval_ms: i64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, interval_ms: i64) -> Self {
        Self { store, clock, interval_ms }
    }

    /// `true` when a new submission is allowed now.
    pub fn check_rate_limit(&self) -> bool {
        self.remaining_ms().is_none()
    }

    /// Milliseconds left before the next submission is allowed, if any.
    ///
    /// An unreadable or unparsable marker, or one in the future, does not
    /// block submissions.
    pub fn remaining_ms(&self) -> Option<i64> {
        let last = self.last_submission()?;
        let elapsed = (self.clock.now() - last).num_milliseconds();
        if elapsed < 0 {
            warn!("Last submission marker is in the future, ignoring it");
            return None;
        }
        (elapsed < self.interval_ms).then(|| self.interval_ms - elapsed)
    }

    pub fn record_submission(&self) {
        let now = self.clock.now().timestamp_millis().to_string();
        if let Err(e) = self.store.set(LAST_SUBMISSION_KEY, &now) {
            warn!("Could not record submission time: {e}");
        }
    }

    fn last_submission(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(LAST_SUBMISSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Could not read last submission time: {e}");
                return None;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(ms) => Utc.timestamp_millis_opt(ms).single(),
            Err(_) => {
                warn!("Ignoring unparsable last submission marker {raw:?}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tiers::session::SessionStore;
    use std::time::Duration;

    fn limiter() -> (RateLimiter, Arc<ManualClock>, Arc<SessionStore>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let store = Arc::new(SessionStore::new());
        (RateLimiter::new(store.clone(), clock.clone(), 60_000), clock, store)
    }

    #[test]
    fn first_submission_is_allowed() {
        let (limiter, _, _) = limiter();
        assert!(limiter.check_rate_limit());
    }

    #[test]
    fn blocks_inside_interval_and_releases_after() {
        let (limiter, clock, _) = limiter();
        limiter.record_submission();

        clock.advance(Duration::from_millis(59_999));
        assert!(!limiter.check_rate_limit());
        assert_eq!(limiter.remaining_ms(), Some(1));

        clock.advance(Duration::from_millis(1));
        assert!(limiter.check_rate_limit());
    }

    #[test]
    fn garbage_marker_does_not_block() {
        let (limiter, _, store) = limiter();
        store.set(LAST_SUBMISSION_KEY, "yesterday-ish").unwrap();
        assert!(limiter.check_rate_limit());
    }

    #[test]
    fn future_marker_does_not_block() {
        let (limiter, clock, store) = limiter();
        let future = clock.now().timestamp_millis() + 3_600_000;
        store.set(LAST_SUBMISSION_KEY, &future.to_string()).unwrap();
        assert!(limiter.check_rate_limit());
    }
}
