//! Bounded retry with exponential backoff and jitter

use crate::config::RetryConfig;
use crate::crawler::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Deterministic part of the wait after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Backoff plus a random share of the jitter
    fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(extra)
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out
    ///
    /// `NotFound` and other non-retryable errors are returned immediately.
    /// Each retry is logged at WARN; the caller records the final failure.
    ///
    /// # Arguments
    ///
    /// * `url` - Used only for log context
    /// * `operation` - Called with the 1-based attempt number
    pub async fn run<T, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
