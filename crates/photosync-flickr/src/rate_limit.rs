//! Client-side rate limiting for the Flickr API
//!
//! Flickr enforces an hourly per-key request budget and answers HTTP 429
//! once it is exceeded. The limiter here spends that budget smoothly and
//! adapts when the service pushes back.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: token bucket with an adaptive effective capacity
//! - [`RateLimiter`]: shared async front end (`acquire`, `on_success`,
//!   `on_throttle`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use photosync_flickr::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(RateLimitConfig::per_hour(3600));
//! limiter.acquire().await;
//! // ... make API call ...
//! limiter.on_success();
//! # }
//! ```

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Successes needed before the effective capacity grows again
const RECOVERY_INTERVAL: u64 = 100;

// ============================================================================
// TokenBucket
// ============================================================================

#[derive(Debug)]
struct BucketState {
    /// Fractional so refill stays smooth
    tokens: f64,
    last_refill: Instant,
    /// Reduced on throttle, recovered on success
    effective_capacity: u32,
    success_count: u64,
}

/// Token bucket whose capacity shrinks on throttle and recovers over time
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
                effective_capacity: capacity,
                success_count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(state: &mut BucketState, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens =
                (state.tokens + elapsed * refill_rate).min(f64::from(state.effective_capacity));
            state.last_refill = now;
        }
    }

    /// Takes one token if available
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        Self::refill(&mut state, self.refill_rate);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until the next token is available (0.0 if one is available now)
    pub fn time_until_available(&self) -> f64 {
        let mut state = self.lock();
        Self::refill(&mut state, self.refill_rate);
        if state.tokens >= 1.0 {
            0.0
        } else if self.refill_rate > 0.0 {
            (1.0 - state.tokens) / self.refill_rate
        } else {
            f64::MAX
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = self.lock();
        Self::refill(&mut state, self.refill_rate);
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn effective_capacity(&self) -> u32 {
        self.lock().effective_capacity
    }

    /// Every [`RECOVERY_INTERVAL`] consecutive successes the effective
    /// capacity grows by 5% (at least 1), up to the configured capacity.
    pub fn on_success(&self) {
        let mut state = self.lock();
        state.success_count += 1;
        if state.success_count % RECOVERY_INTERVAL == 0 && state.effective_capacity < self.capacity
        {
            let increase = ((f64::from(state.effective_capacity) * 0.05) as u32).max(1);
            let new_capacity = (state.effective_capacity + increase).min(self.capacity);
            debug!(
                old_capacity = state.effective_capacity,
                new_capacity, "Increasing rate limit capacity"
            );
            state.effective_capacity = new_capacity;
        }
    }

    /// Halves the effective capacity (minimum 1) and drains the bucket
    pub fn on_throttle(&self) {
        let mut state = self.lock();
        let old = state.effective_capacity;
        state.effective_capacity = (old / 2).max(1);
        state.tokens = state.tokens.min(0.0);
        state.success_count = 0;
        warn!(
            old_capacity = old,
            new_capacity = state.effective_capacity,
            "Throttled by server, halving rate limit capacity"
        );
    }
}

// ============================================================================
// RateLimitConfig
// ============================================================================

/// Parameters of the request budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Burst size (tokens)
    pub capacity: u32,
    /// Sustained rate (tokens per second)
    pub refill_rate: f64,
}

impl RateLimitConfig {
    /// Spreads `requests_per_hour` evenly, allowing a burst of one
    /// minute's worth of requests.
    pub fn per_hour(requests_per_hour: u32) -> Self {
        let requests_per_hour = requests_per_hour.max(1);
        Self {
            capacity: (requests_per_hour / 60).max(1),
            refill_rate: f64::from(requests_per_hour) / 3600.0,
        }
    }
}

impl Default for RateLimitConfig {
    /// Flickr's documented budget of 3600 requests per hour per key
    fn default() -> Self {
        Self::per_hour(3600)
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

/// Async rate limiter shared by every request of a client
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config.capacity, config.refill_rate),
        }
    }

    /// Waits until a request may be sent
    pub async fn acquire(&self) {
        loop {
            if self.bucket.try_acquire() {
                return;
            }
            let wait = Duration::from_secs_f64(self.bucket.time_until_available().clamp(0.01, 60.0));
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self) {
        self.bucket.on_success();
    }

    pub fn on_throttle(&self) {
        self.bucket.on_throttle();
    }

    pub fn effective_capacity(&self) -> u32 {
        self.bucket.effective_capacity()
    }

    pub fn available_tokens(&self) -> f64 {
        self.bucket.available_tokens()
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Parses a `Retry-After` value (delta seconds or an HTTP date)
///
/// Returns `None` when the value cannot be parsed or the date is in the past.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    let seconds: u64 = remaining.num_seconds().try_into().ok()?;
    Some(Duration::from_secs(seconds.min(3600)))
}
