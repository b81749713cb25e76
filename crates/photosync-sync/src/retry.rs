//! Bounded retry with exponential backoff
//!
//! Remote calls that fail with a retryable [`GatewayError`] are repeated up
//! to `max_retries` times. The delay before retry `n` (0-based) is
//! `min(base * 2^n, max)`, stretched to the server's `Retry-After` when that
//! is longer. When the budget runs out the caller gets
//! [`SyncError::RetriesExhausted`] instead of looping forever.

use std::future::Future;
use std::time::Duration;

use photosync_core::config::SyncConfig;
use photosync_core::ports::GatewayError;
use tracing::{info, warn};

use crate::SyncError;

/// Flickr error codes that no retry can fix (bad key, bad token, no permission)
const PERMANENT_API_CODES: &[i64] = &[0, 96, 97, 98, 99, 100, 401, 403];

// ============================================================================
// RetryPolicy
// ============================================================================

/// How often and how patiently a remote call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay(),
            config.retry_max_delay(),
        )
    }

    /// A policy that gives up on the first failure
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based) after `err`
    pub fn delay_for(&self, attempt: u32, err: &GatewayError) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match err.retry_after() {
            Some(requested) if requested > backoff => requested,
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

// ============================================================================
// RetryScope
// ============================================================================

/// Which failures are worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryScope {
    /// Transport failures and rate limiting only
    Transient,
    /// Also service errors, except authentication and permission failures
    ///
    /// Used for uploads and album membership changes, where the service
    /// reports temporary conditions as API errors.
    Remote,
}

impl RetryScope {
    pub fn should_retry(&self, err: &GatewayError) -> bool {
        if err.is_retryable() {
            return true;
        }
        match (self, err) {
            (RetryScope::Remote, GatewayError::Api { code, .. }) => {
                !PERMANENT_API_CODES.contains(code)
            }
            _ => false,
        }
    }
}

// ============================================================================
// with_retry
// ============================================================================

/// A successful result together with the retries it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Runs `f` until it succeeds, fails with an error outside `scope`, or the
/// policy's retry budget is spent
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    scope: RetryScope,
    operation: &str,
    mut f: F,
) -> Result<Retried<T>, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, retries = attempt, "Operation succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    retries: attempt,
                });
            }
            Err(err) if !scope.should_retry(&err) => return Err(SyncError::Gateway(err)),
            Err(err) if attempt >= policy.max_retries => {
                warn!(
                    operation,
                    attempts = attempt + 1,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(SyncError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt + 1,
                    last_error: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt, &err);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
