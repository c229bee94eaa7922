use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

/// Client-side ceiling on outgoing request rate.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// Reddit allows 100 requests per minute for OAuth2 clients.
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100,
            time_window: Duration::from_secs(60),
            burst_allowance: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled continuously at `max_requests / time_window`.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// Take `tokens_needed` tokens, or report how long until they are
    /// available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let deficit = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

/// Blocks callers until a request slot is available, keeping the client
/// under the upstream requests-per-minute ceiling.
#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.burst_allowance as usize));
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
            config,
        }
    }

    /// Wait for a permit. Holds a semaphore slot for the lifetime of the
    /// returned guard so in-flight requests also stay bounded.
    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore closed");

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!(?wait_time, "rate limit reached, waiting");
                    sleep(wait_time).await;
                }
            }
        }

        RateLimitPermit {
            _permit: permit,
            queue_wait_time: start.elapsed(),
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let available_tokens = self.token_bucket.available_tokens().await;

        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            available_permits: self.semaphore.available_permits(),
            requests_per_minute: self.config.max_requests,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: usize,
    pub requests_per_minute: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_honors_burst_allowance() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };
        let bucket = TokenBucket::new(&config);

        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }
        assert!(bucket.acquire(1.0).await.is_err());
    }

    #[tokio::test]
    async fn token_bucket_refills_over_time() {
        let config = RateLimitConfig {
            max_requests: 60, // one token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        };
        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(2.0).await.is_ok());
        assert!(bucket.acquire(1.0).await.is_err());

        sleep(Duration::from_millis(1100)).await;
        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[tokio::test]
    async fn acquire_reports_wait_for_deficit() {
        let config = RateLimitConfig {
            max_requests: 60,
            time_window: Duration::from_secs(60),
            burst_allowance: 1,
        };
        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(1.0).await.is_ok());
        let wait = bucket.acquire(1.0).await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn limiter_hands_out_permits_and_status() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        let _p1 = limiter.acquire_permit().await;
        let _p2 = limiter.acquire_permit().await;

        let status = limiter.status().await;
        assert!(status.available_tokens <= status.max_tokens);
        assert_eq!(status.requests_per_minute, 100);
    }
}
