//! Generic retry with exponential backoff and jitter.

use std::time::Duration;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_jitter_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// `base × 2^attempt` plus up to `max_jitter_ms` of random jitter.
    /// `attempt` is zero-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        };
        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

/// How a failed attempt should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<E> {
    /// Transient; try again after the backoff delay.
    Retry(E),
    /// Terminal; stop immediately and return the error.
    Abort(E),
}

/// Runs `op` until it succeeds, aborts, or the policy runs out of attempts.
///
/// `op` receives the zero-based attempt number. No delay follows the last
/// attempt. The last error is returned on exhaustion.
pub fn retry_with_backoff<T, E, F>(policy: &RetryPolicy, clock: &dyn Clock, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, Attempt<E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(Attempt::Abort(err)) => return Err(err),
            Err(Attempt::Retry(err)) => {
                if attempt + 1 >= attempts {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                debug!("Attempt {} failed, retrying in {:?}", attempt + 1, delay);
                clock.sleep(delay);
                attempt += 1;
            }
        }
    }
}
