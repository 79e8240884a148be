//! Retry policy with exponential backoff and jitter
//!
//! The same policy wraps the listing fetch, the details fetch and the media
//! lookup. Whether an error is worth another attempt is decided by the error
//! type through [`Retryable`].

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Upper bound on a single backoff sleep, jitter excluded
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Errors that can tell a transient failure from a permanent one
pub trait Retryable: Sized {
    /// Returns true if another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Wraps the last error once the attempt ceiling is reached
    fn exhausted(self, attempts: u32) -> Self;
}

/// Backoff schedule: `base_delay * factor^n` plus up to `jitter` on every sleep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(600),
            factor: 2.0,
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: secs_capped(config.base_delay),
            factor: if config.factor.is_finite() {
                config.factor.max(1.0)
            } else {
                1.0
            },
            jitter: secs_capped(config.jitter),
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-based), without jitter
    ///
    /// Never exceeds [`MAX_BACKOFF`], however large the factor or retry count.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    fn jitter_sample(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let secs = rand::rng().random_range(0.0..=self.jitter.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.jitter)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `on_retry` is called with the failed attempt number, the delay about to
    /// be slept and the error, just before each backoff sleep. Permanent
    /// errors are returned untouched; a transient error on the last attempt is
    /// returned through [`Retryable::exhausted`].
    pub async fn run<T, E, Op, Fut, O>(&self, mut op: Op, mut on_retry: O) -> Result<T, E>
    where
        E: Retryable,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        O: FnMut(u32, Duration, &E),
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => return Err(err.exhausted(attempt)),
                Err(err) => {
                    let delay = self.backoff(attempt - 1) + self.jitter_sample();
                    on_retry(attempt, delay, &err);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Seconds to a duration, saturating at [`MAX_BACKOFF`]; NaN and negatives become zero
fn secs_capped(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}
