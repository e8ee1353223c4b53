//! Resilient HTTP fetcher shared by every site adapter.

mod origin;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::ScraperError;
use crate::identity::IdentityPool;
use crate::rate_limit::{retry_with_backoff, RetryPolicy};

pub(crate) use origin::{extract_domain, join_url};

/// Identity used when the rotation pool is empty.
pub const FALLBACK_USER_AGENT: &str = pricewatch_core::DEFAULT_FALLBACK_USER_AGENT;

/// Timeouts and retry knobs for a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub fallback_user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            retry: RetryPolicy::default(),
            fallback_user_agent: FALLBACK_USER_AGENT.to_owned(),
        }
    }
}

impl FetcherConfig {
    #[must_use]
    pub fn from_app_config(config: &pricewatch_core::AppConfig) -> Self {
        Self {
            request_timeout_secs: config.scraper_request_timeout_secs,
            connect_timeout_secs: config.scraper_connect_timeout_secs,
            retry: RetryPolicy {
                max_retries: config.scraper_max_retries,
                backoff_factor: config.scraper_backoff_factor,
                backoff_base: Duration::from_millis(config.scraper_backoff_base_ms),
            },
            fallback_user_agent: config.scraper_fallback_user_agent.clone(),
        }
    }
}

/// HTTP client for marketplace pages and APIs.
///
/// Every attempt picks a fresh identity from the [`IdentityPool`]. Transient
/// errors (network failures, 429, 5xx) are retried per the [`RetryPolicy`];
/// 404 and other 4xx responses, and bodies that fail to parse, are returned
/// immediately as typed errors.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    identities: IdentityPool,
    fallback_user_agent: Arc<str>,
}

impl Fetcher {
    /// Builds a fetcher with bounded connect and read timeouts per attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &FetcherConfig, identities: IdentityPool) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            retry: config.retry,
            identities,
            fallback_user_agent: config.fallback_user_agent.as_str().into(),
        })
    }

    /// Builds a fetcher from application config, loading the identity pool
    /// from `scraper_user_agents_path` when set and the built-in pool otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &pricewatch_core::AppConfig) -> Result<Self, ScraperError> {
        let identities = match &config.scraper_user_agents_path {
            Some(path) => IdentityPool::from_json_file(path),
            None => IdentityPool::builtin(),
        };
        tracing::debug!(identities = identities.len(), "identity pool loaded");
        Self::new(&FetcherConfig::from_app_config(config), identities)
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn identity(&self) -> &str {
        self.identities
            .pick()
            .unwrap_or_else(|| self.fallback_user_agent.as_ref())
    }

    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all retries.
    /// - [`ScraperError::UnexpectedStatus`]: 5xx after all retries, other 4xx immediately.
    /// - [`ScraperError::NotFound`]: HTTP 404 (not retried).
    /// - [`ScraperError::Http`]: network failure after all retries.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, &str)],
    ) -> Result<String, ScraperError> {
        retry_with_backoff(&self.retry, |attempt| async move {
            self.attempt_text(url, headers, query, attempt).await
        })
        .await
    }

    /// Fetches `url` and deserializes the body as JSON.
    ///
    /// A body that does not parse is a permanent failure and is not retried.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`], plus [`ScraperError::Deserialize`].
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, &str)],
    ) -> Result<T, ScraperError> {
        retry_with_backoff(&self.retry, |attempt| async move {
            let body = self.attempt_text(url, headers, query, attempt).await?;
            serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("response from {url}"),
                source: e,
            })
        })
        .await
    }

    async fn attempt_text(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, &str)],
        attempt: u32,
    ) -> Result<String, ScraperError> {
        let user_agent = self.identity();
        tracing::debug!(url, attempt, user_agent, "fetching");

        let mut request = self.client.get(url).headers(headers.clone());
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            request = request.header(reqwest::header::USER_AGENT, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                domain: extract_domain(url),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_fixed_identity_when_pool_is_empty() {
        let config = FetcherConfig {
            fallback_user_agent: "pricewatch-fallback/1.0".to_owned(),
            ..FetcherConfig::default()
        };
        let fetcher = Fetcher::new(&config, IdentityPool::default()).unwrap();
        assert_eq!(fetcher.identity(), "pricewatch-fallback/1.0");
    }

    #[test]
    fn default_fallback_matches_config_default() {
        assert_eq!(
            FetcherConfig::default().fallback_user_agent,
            pricewatch_core::DEFAULT_FALLBACK_USER_AGENT
        );
    }

    #[test]
    fn rotates_through_configured_pool() {
        let pool = IdentityPool::new(vec!["UA-A".into(), "UA-B".into()]);
        let fetcher = Fetcher::new(&FetcherConfig::default(), pool).unwrap();
        for _ in 0..10 {
            assert!(["UA-A", "UA-B"].contains(&fetcher.identity()));
        }
    }
}
