use std::time::Duration;

use redwatch_core::{CoreError, RedditApiError};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
    /// Cap on the delay between attempts (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0) added on top of the computed delay.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Tuned for the Reddit API: slower start, wider jitter.
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff.
    Retry,
    /// Retry after a delay the server asked for.
    RetryWithDelay(Duration),
    /// Permanent failure, give up.
    NoRetry,
}

/// Classify an error into a retry strategy.
pub fn retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            RedditApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            RedditApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            RedditApiError::InvalidToken => RetryStrategy::NoRetry,
            RedditApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            RedditApiError::NotFound { .. } => RetryStrategy::NoRetry,
            RedditApiError::SubredditNotFound { .. } => RetryStrategy::NoRetry,
            RedditApiError::UserNotFound { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Exponential backoff with jitter for the given zero-based attempt.
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential_ms = if attempt == 0 {
        config.base_delay_ms
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms)
    };

    let jitter_range = (exponential_ms as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    Duration::from_millis((exponential_ms + jitter).min(config.max_delay_ms))
}

/// Run `operation` until it succeeds, a permanent error is hit, or attempts
/// run out. The last error is returned unchanged.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            debug!(operation_name, attempt, "retrying");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(operation_name, attempt, "succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                let has_attempts_left = attempt + 1 < config.max_attempts;

                match retry_strategy(&error) {
                    RetryStrategy::Retry if has_attempts_left => {
                        let delay = backoff_delay(attempt, config);
                        info!(operation_name, ?delay, %error, "transient failure, backing off");
                        last_error = Some(error);
                        sleep(delay).await;
                    }
                    RetryStrategy::RetryWithDelay(delay) if has_attempts_left => {
                        info!(operation_name, ?delay, %error, "rate limited, waiting as instructed");
                        last_error = Some(error);
                        sleep(delay).await;
                    }
                    RetryStrategy::NoRetry => {
                        debug!(operation_name, %error, "permanent failure, not retrying");
                        return Err(error);
                    }
                    _ => {
                        warn!(operation_name, %error, "attempts exhausted");
                        return Err(error);
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| CoreError::Internal {
        message: format!("{operation_name} failed with no recorded error"),
    }))
}
