//! Catalog HTTP client.
//!
//! Every call carries `Authorization: Bearer <token>`. The token comes from
//! `POST /auth/login` and is cached for the life of the client (shared by all
//! clones). A 401 clears the cached token and the call is retried once after
//! logging in again.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use pricewatch_core::{
    AppConfig, CatalogProduct, CatalogProductUpdate, NewCatalogProduct, SearchSpec, SiteIdentity,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::CatalogError;

/// Characters escaped when a product URL or site name is embedded in a path.
/// `/` and `:` are kept: the catalog routes `/products/url/{url:path}`.
const PATH_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Client for the catalog boundary.
///
/// Cloning shares the connection pool and the cached token.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    username: String,
    password: Arc<str>,
    page_size: u32,
    token: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout_secs: u64,
        page_size: u32,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pricewatch/0.1 (catalog-ingest)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            username: username.to_owned(),
            password: password.into(),
            page_size: page_size.max(1),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, CatalogError> {
        Self::new(
            &config.catalog_url,
            &config.catalog_username,
            &config.catalog_password,
            config.catalog_timeout_secs,
            config.catalog_page_size,
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// Logs in and returns a fresh bearer token without caching it.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Auth`] if the catalog rejects the credentials.
    /// - [`CatalogError::Http`] on network failure.
    /// - [`CatalogError::Deserialize`] if the response has no `access_token`.
    pub async fn login(&self) -> Result<String, CatalogError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .form(&[
                ("username", self.username.as_str()),
                ("password", &*self.password),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Auth {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| CatalogError::Deserialize {
                context: "POST /auth/login".to_owned(),
                source: e,
            })?;
        tracing::debug!(username = %self.username, "catalog login succeeded");
        Ok(login.access_token)
    }

    async fn token(&self) -> Result<String, CatalogError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut cached = self.token.write().await;
        // Another task may have logged in while this one waited for the lock.
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self, rejected: &str) {
        let mut cached = self.token.write().await;
        if cached.as_deref() == Some(rejected) {
            *cached = None;
        }
    }

    /// Sends an authenticated request, re-logging in once on 401.
    async fn send<F>(&self, endpoint: &str, build: F) -> Result<Response, CatalogError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&self.client).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(endpoint, "catalog token rejected, logging in again");
        self.invalidate(&token).await;
        let token = self.token().await?;
        Ok(build(&self.client).bearer_auth(&token).send().await?)
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> Result<T, CatalogError> {
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_owned(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Deserialize {
            context: endpoint.to_owned(),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = self.url(endpoint);
        let response = self
            .send(endpoint, |client| client.get(&url).query(query))
            .await?;
        Self::read_json(endpoint, response).await
    }

    /// Resolves a catalog site by name. `None` when the catalog has no such site.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status or body failures.
    pub async fn site_by_name(&self, name: &str) -> Result<Option<SiteIdentity>, CatalogError> {
        let endpoint = format!(
            "/source_websites/name/{}",
            utf8_percent_encode(name, PATH_VALUE)
        );
        let url = self.url(&endpoint);
        let response = self.send(&endpoint, |client| client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_json::<Option<SiteIdentity>>(&endpoint, response).await
    }

    /// Every active search config.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status or body failures.
    pub async fn active_searches(&self) -> Result<Vec<SearchSpec>, CatalogError> {
        let specs: Vec<SearchSpec> = self.get_json("/search_configs/", &[]).await?;
        Ok(specs.into_iter().filter(|s| s.is_active).collect())
    }

    /// Active search configs that include the given site.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status or body failures.
    pub async fn searches_for_site(&self, site_id: i64) -> Result<Vec<SearchSpec>, CatalogError> {
        let specs: Vec<SearchSpec> = self
            .get_json(&format!("/search_configs/source_websites/{site_id}"), &[])
            .await?;
        Ok(specs.into_iter().filter(|s| s.is_active).collect())
    }

    /// Pages through a product listing endpoint with `limit`/`offset`.
    ///
    /// Stops on a short page, or on a page that brings no unseen ids (a
    /// catalog that ignores the paging parameters returns the same rows
    /// again).
    async fn drain_products(
        &self,
        endpoint: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        let limit = self.page_size as usize;
        let mut products = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut offset = 0usize;

        loop {
            let mut query = filters.to_vec();
            query.push(("limit", limit.to_string()));
            query.push(("offset", offset.to_string()));

            let page: Vec<CatalogProduct> = self.get_json(endpoint, &query).await?;
            let page_len = page.len();
            let before = seen.len();
            for product in page {
                if seen.insert(product.id) {
                    products.push(product);
                }
            }

            if page_len < limit || seen.len() == before {
                break;
            }
            offset += page_len;
        }

        tracing::debug!(endpoint, products = products.len(), "catalog listing drained");
        Ok(products)
    }

    /// URLs of every product the catalog already holds for a site.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status or body failures.
    pub async fn known_product_urls(&self, site_id: i64) -> Result<HashSet<String>, CatalogError> {
        let products = self.drain_products("/products/", &[]).await?;
        Ok(products
            .into_iter()
            .filter(|p| p.source_website_id == Some(site_id))
            .map(|p| p.url)
            .collect())
    }

    /// Products of a site last updated at or before `updated_before`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status or body failures.
    pub async fn stale_products(
        &self,
        site_id: i64,
        updated_before: NaiveDateTime,
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        let cutoff = updated_before.format("%Y-%m-%dT%H:%M:%S").to_string();
        let products = self
            .drain_products("/products/filter/", &[("updated_before", cutoff)])
            .await?;
        Ok(products
            .into_iter()
            .filter(|p| p.source_website_id == Some(site_id))
            .collect())
    }

    /// Whether a product with exactly this URL exists.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport failures or statuses other than
    /// 200 and 404.
    pub async fn product_exists(&self, product_url: &str) -> Result<bool, CatalogError> {
        let endpoint = format!(
            "/products/url/{}",
            utf8_percent_encode(product_url, PATH_VALUE)
        );
        let url = self.url(&endpoint);
        let response = self.send(&endpoint, |client| client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let found: Option<serde_json::Value> = Self::read_json(&endpoint, response).await?;
        Ok(found.is_some_and(|v| !v.is_null()))
    }

    /// Creates a product. The catalog records the initial price history entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnexpectedStatus`] when the catalog answers
    /// anything but 200/201, e.g. because the URL was created concurrently.
    pub async fn create_product(&self, product: &NewCatalogProduct) -> Result<(), CatalogError> {
        let endpoint = "/products/";
        let url = self.url(endpoint);
        let response = self
            .send(endpoint, |client| client.post(&url).json(product))
            .await?;
        let status = response.status();
        if status == StatusCode::CREATED || status == StatusCode::OK {
            return Ok(());
        }
        Err(CatalogError::UnexpectedStatus {
            status: status.as_u16(),
            endpoint: endpoint.to_owned(),
        })
    }

    /// Updates a product. The catalog appends a price history entry when the
    /// price changed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnexpectedStatus`] on any non-2xx answer.
    pub async fn update_product(
        &self,
        id: i64,
        update: &CatalogProductUpdate,
    ) -> Result<(), CatalogError> {
        let endpoint = format!("/products/{id}");
        let url = self.url(&endpoint);
        let response = self
            .send(&endpoint, |client| client.put(&url).json(update))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(CatalogError::UnexpectedStatus {
            status: status.as_u16(),
            endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> CatalogClient {
        CatalogClient::new("http://catalog.local/", "worker", "s3cret", 5, 100)
            .expect("client construction should not fail")
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(
            test_client().url("/products/"),
            "http://catalog.local/products/"
        );
    }

    #[test]
    fn debug_output_redacts_password() {
        let debug = format!("{:?}", test_client());
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn path_values_keep_slashes_and_escape_query_marks() {
        let encoded =
            utf8_percent_encode("https://sp.olx.com.br/a b?x=1#f", PATH_VALUE).to_string();
        assert_eq!(encoded, "https://sp.olx.com.br/a%20b%3Fx=1%23f");
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let client = CatalogClient::new("http://catalog.local", "u", "p", 5, 0).unwrap();
        assert_eq!(client.page_size, 1);
    }
}
