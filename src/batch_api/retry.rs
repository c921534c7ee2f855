use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::error::ApiError;

/// Retry schedule applied around each remote operation.
///
/// Delay before attempt `n + 1` is `multiplier * 2^(n - 1)` seconds, clamped to
/// `[min_delay, max_delay]`. Only errors accepted by `retry_if` are retried;
/// anything else, or the error of the last allowed attempt, is returned as is.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retry_if: fn(&ApiError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            retry_if: ApiError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Schedule for upload, submit and poll.
    pub fn remote_call() -> Self {
        Self::default()
    }

    /// Shorter schedule for result downloads.
    pub fn download() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let raw = self.multiplier.saturating_mul(factor);
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && (self.retry_if)(&err) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(operation, attempt, error = %err, "remote call failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
impl RetryPolicy {
    /// Same attempt budget, no waiting between attempts.
    pub(crate) fn without_delay(mut self) -> Self {
        self.multiplier = Duration::ZERO;
        self.min_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self
    }
}
