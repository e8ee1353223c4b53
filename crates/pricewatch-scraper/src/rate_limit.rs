//! Retry policy for marketplace fetches.
//!
//! Transient failures (network errors, 429, 5xx) are retried with exponential
//! backoff. Everything else, including parse failures and other 4xx
//! responses, is propagated on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Exponential backoff parameters.
///
/// The wait before retry `n` (1-based) is `backoff_base * backoff_factor^(n-1)`.
/// The operation runs at most `max_retries + 1` times; no sleep follows the
/// final failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (0-based), before the next one.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(multiplier)
    }
}

/// Returns `true` if `err` represents a transient condition worth retrying.
///
/// Retriable:
/// - [`ScraperError::Http`] transport failures (timeout, connect, reset).
/// - [`ScraperError::RateLimited`] (HTTP 429).
/// - [`ScraperError::UnexpectedStatus`] with a 5xx status.
///
/// Not retriable: 404 and other 4xx, malformed bodies, missing listing data,
/// invalid URLs, pagination guards.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.is_body()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        ScraperError::RateLimited { .. } => true,
        ScraperError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        ScraperError::NotFound { .. }
        | ScraperError::Deserialize { .. }
        | ScraperError::MissingData { .. }
        | ScraperError::InvalidUrl { .. }
        | ScraperError::PaginationLimit { .. }
        | ScraperError::UnsupportedSite(_) => false,
    }
}

/// Runs `operation` under `policy`, passing it the 0-based attempt number.
///
/// With the default policy (`factor = 2`, `base = 1s`, `max_retries = 3`):
///
/// | Attempt | Sleep before it |
/// |---------|-----------------|
/// | 0 (initial) | none |
/// | 1 | 1 s |
/// | 2 | 2 s |
/// | 3 | 4 s |
///
/// A failure on attempt 3 is returned without sleeping again.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
