//! Client-side request pacing for the Reddit OAuth API.
//!
//! Two limits are combined: a local token bucket that keeps the average
//! request rate under the documented quota, and the server's own
//! `X-Ratelimit-Remaining` / `X-Ratelimit-Reset` headers, which win when the
//! server says the window is exhausted.

use reqwest::header::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_USED: &str = "x-ratelimit-used";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100, // Reddit allows 100 requests per minute for OAuth2
            time_window: Duration::from_secs(60), // 1 minute window
            burst_allowance: 10, // Allow small bursts up to 10 requests
        }
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    tokens: Arc<Mutex<f64>>,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Arc<Mutex<Instant>>,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            tokens: Arc::new(Mutex::new(capacity)),
            capacity,
            refill_rate,
            last_refill: Arc::new(Mutex::new(Instant::now())),
        }
    }

    async fn refill(&self) -> f64 {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        let mut last_refill = self.last_refill.lock().await;

        let elapsed = now.duration_since(*last_refill);
        *tokens = (*tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        *last_refill = now;

        *tokens
    }

    /// Takes `tokens_needed` or reports how long until they are available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        self.refill().await;

        let mut tokens = self.tokens.lock().await;
        if *tokens >= tokens_needed {
            *tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - *tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn get_available_tokens(&self) -> f64 {
        self.refill().await
    }
}

/// Quota state last reported by the server.
#[derive(Debug, Clone, Default)]
struct ServerWindow {
    remaining: Option<f64>,
    used: Option<u32>,
    reset_at: Option<Instant>,
}

impl ServerWindow {
    fn wait_time(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(remaining), Some(reset_at)) if remaining < 1.0 && reset_at > now => {
                Some(reset_at - now)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    config: RateLimitConfig,
    server_window: Mutex<ServerWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            config,
            server_window: Mutex::new(ServerWindow::default()),
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();

        let server_wait = self.server_window.lock().await.wait_time(Instant::now());
        if let Some(wait_time) = server_wait {
            tracing::warn!(
                "Reddit reports the rate limit window is exhausted, waiting {:?}",
                wait_time
            );
            sleep(wait_time).await;
        }

        // Try to acquire token, wait if necessary
        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        RateLimitPermit {
            queue_wait_time: start_time.elapsed(),
        }
    }

    /// Records the quota headers of a Reddit response. Missing or
    /// unparsable headers leave the previous values in place.
    pub async fn update_from_headers(&self, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        let mut window = self.server_window.lock().await;
        if let Some(remaining) = header(HEADER_REMAINING) {
            window.remaining = Some(remaining);
        }
        if let Some(used) = header(HEADER_USED) {
            window.used = Some(used as u32);
        }
        if let Some(reset) = header(HEADER_RESET) {
            let reset_at = Duration::try_from_secs_f64(reset.max(0.0))
                .ok()
                .and_then(|delay| Instant::now().checked_add(delay));
            match reset_at {
                Some(at) => window.reset_at = Some(at),
                None => tracing::debug!("Ignoring out of range {} header: {}", HEADER_RESET, reset),
            }
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let available_tokens = self.token_bucket.get_available_tokens().await;
        let window = self.server_window.lock().await.clone();
        let now = Instant::now();

        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            requests_per_minute: self.config.max_requests,
            server_remaining: window.remaining.map(|r| r as u32),
            server_used: window.used,
            server_reset_in: window.reset_at.map(|at| at.saturating_duration_since(now)),
            estimated_wait_time: window.wait_time(now),
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub requests_per_minute: u32,
    pub server_remaining: Option<u32>,
    pub server_used: Option<u32>,
    pub server_reset_in: Option<Duration>,
    pub estimated_wait_time: Option<Duration>,
}

impl RateLimitStatus {
    pub fn utilization_percentage(&self) -> f64 {
        let used_tokens = self.max_tokens.saturating_sub(self.available_tokens);
        (used_tokens as f64 / self.max_tokens as f64) * 100.0
    }

    pub fn is_near_limit(&self) -> bool {
        let server_low = self.server_remaining.map_or(false, |r| r < 10);
        server_low || self.utilization_percentage() > 80.0
    }
}
