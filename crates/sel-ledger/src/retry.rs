use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LedgerResult;

/// Retry policy for contended or unavailable transactions.
///
/// Retries are safe because every attempt re-reads edge existence before
/// deciding what to write. Permission and validation failures are never
/// retried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Backoff before the second attempt, doubled on each further attempt.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff.
    pub max_delay_ms: u64,
    /// Randomize each backoff within `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 1_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let ceiling = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        if !self.jitter || ceiling < 2 {
            return Duration::from_millis(ceiling);
        }
        let floor = ceiling / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
    }

    /// Run `attempt` until it succeeds, fails terminally, or the attempt
    /// budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> LedgerResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retriable() && n < max => {
                    let delay = self.delay_after(n);
                    debug!(op, attempt = n, ?delay, error = %err, "retrying transaction");
                    tokio::time::sleep(delay).await;
                    n += 1;
                }
                Err(err) => {
                    if err.is_retriable() {
                        warn!(op, attempts = n, error = %err, "retry budget exhausted");
                    }
                    return Err(err.with_attempts(n));
                }
            }
        }
    }
}
