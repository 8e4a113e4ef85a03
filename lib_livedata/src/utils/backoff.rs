//! # Retry Policy & Backoff Schedule
//!
//! Exponential backoff with full jitter. Queries and mutations use a
//! bounded schedule; the subscription transport uses an unbounded one for
//! its reconnect loop.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::errors::ApiError;

/// Bounded retry policy for remote operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so 4 means 1 try + 3 retries).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Delay generator. `next_delay` returns `None` once the bounded attempt
/// budget is spent; an unbounded schedule never returns `None`.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempts_left: Option<u32>,
    exponent: u32,
}

impl Backoff {
    pub fn bounded(policy: &RetryPolicy) -> Self {
        Self {
            base: policy.base_delay,
            max: policy.max_delay,
            attempts_left: Some(policy.max_attempts.saturating_sub(1)),
            exponent: 0,
        }
    }

    pub fn unbounded(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts_left: None,
            exponent: 0,
        }
    }

    /// Next sleep before another attempt, with full jitter applied.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(left) = self.attempts_left.as_mut() {
            if *left == 0 {
                return None;
            }
            *left -= 1;
        }
        let ceiling = self.ceiling_millis();
        let jittered = rand::rng().random_range(0..=ceiling);
        self.exponent = self.exponent.saturating_add(1);
        Some(Duration::from_millis(jittered))
    }

    /// Current un-jittered ceiling: min(max, base * 2^exponent).
    fn ceiling_millis(&self) -> u64 {
        let base = self.base.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        base.saturating_mul(1u64 << self.exponent.min(32)).min(max)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is exhausted. Only `Unavailable` is retried.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut backoff = Backoff::bounded(policy);
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => match backoff.next_delay() {
                Some(delay) => {
                    log::warn!("Transient failure ({}), retrying in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    log::error!("Retry budget exhausted: {}", err);
                    return Err(err);
                }
            },
            Err(err) => return Err(err),
        }
    }
}
