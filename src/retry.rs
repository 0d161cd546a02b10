//! Bounded retry with exponential backoff and jitter.
//!
//! Every network-facing stage (lister, downloader, uploader) receives a
//! [`RetryPolicy`] at construction instead of hand-rolling its own loop.
//! Only errors the policy's error type reports as transient are retried;
//! permanent errors surface immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::warn;

/// Errors that can distinguish retryable from permanent failures.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for crate::types::HarvestError {
    fn is_transient(&self) -> bool {
        crate::types::HarvestError::is_transient(self)
    }
}

/// Exponential backoff: `base_delay * 2^(attempt-1)` capped at `max_delay`,
/// scaled by a random jitter factor in `[1.0, 1.0 + jitter]`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries. Useful in tests and one-shot probes.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Jitter fraction, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows a failed `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if self.jitter > 0.0 {
            let factor = 1.0 + rand::rng().random_range(0.0..self.jitter);
            backoff.mul_f64(factor)
        } else {
            backoff
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The final error is returned unchanged so callers keep the full
    /// failure context for logging and catalog annotation.
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
