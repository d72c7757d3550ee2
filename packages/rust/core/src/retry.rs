//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use articlegen_shared::GenerationConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_backoff,
            max_delay: config.max_backoff,
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// Delay to use after `current`, capped at `max_delay`.
pub fn next_retry_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    if current >= policy.max_delay {
        return policy.max_delay;
    }

    let multiplier = f64::from(policy.backoff_multiplier.max(1.0));
    let scaled = Duration::from_secs_f64(current.as_secs_f64() * multiplier);
    scaled.min(policy.max_delay)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
///
/// Returns the final result and the number of attempts made.
pub async fn execute_with_retry<T, E, Op, Fut, Classify>(
    policy: &RetryPolicy,
    is_retryable: Classify,
    mut operation: Op,
) -> (Result<T, E>, u32)
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Classify: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts: u32 = 0;
    let mut delay = policy.initial_delay.min(policy.max_delay);

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return (Ok(value), attempts),
            Err(error) if attempts <= policy.max_retries && is_retryable(&error) => {
                warn!(
                    attempt = attempts,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retryable failure; backing off"
                );
                tokio::time::sleep(delay).await;
                delay = next_retry_delay(delay, policy);
            }
            Err(error) => return (Err(error), attempts),
        }
    }
}
