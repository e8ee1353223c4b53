//! Enjoei: JSON search API with opaque cursor tokens, per-product JSON endpoint.

use std::str::FromStr;

use futures::stream::BoxStream;
use pricewatch_core::{parse_brl_price, CatalogProduct, ScrapedProduct};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{browser_headers, non_empty, Site, ACCEPT_JSON};
use crate::client::{join_url, Fetcher};
use crate::error::ScraperError;
use crate::pagination::{paginate, Page};

const SEARCH_BASE_URL: &str = "https://enjusearch.enjoei.com.br";
const PAGES_BASE_URL: &str = "https://pages.enjoei.com.br";
const WEB_BASE_URL: &str = "https://www.enjoei.com.br";
const PHOTOS_BASE_URL: &str = "https://photos.enjoei.com.br";

const PAGE_SIZE: &str = "50";
const QUERY_ID: &str = "7d3ea67171219db36dfcf404acab5807";
const SEARCH_ID: &str = "88d3a54e-085a-46bc-a1f8-9726ee34424a-1743974498480";

#[derive(Debug, Clone)]
pub struct EnjoeiAdapter {
    fetcher: Fetcher,
    search_base: String,
    pages_base: String,
    web_base: String,
    photos_base: String,
    max_pages: usize,
}

impl EnjoeiAdapter {
    #[must_use]
    pub fn new(fetcher: Fetcher, max_pages: usize) -> Self {
        Self {
            fetcher,
            search_base: SEARCH_BASE_URL.to_owned(),
            pages_base: PAGES_BASE_URL.to_owned(),
            web_base: WEB_BASE_URL.to_owned(),
            photos_base: PHOTOS_BASE_URL.to_owned(),
            max_pages,
        }
    }

    /// Serves search, product, web and photo URLs from one base. Used by tests
    /// against a mock server.
    #[must_use]
    pub fn with_base_url(fetcher: Fetcher, max_pages: usize, base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            fetcher,
            search_base: base.clone(),
            pages_base: base.clone(),
            web_base: base.clone(),
            photos_base: base,
            max_pages,
        }
    }

    #[must_use]
    pub fn search<'a>(&'a self, term: &'a str) -> BoxStream<'a, Result<String, ScraperError>> {
        paginate("enjoei", None, self.max_pages, move |after| {
            self.search_page(term, after)
        })
    }

    async fn search_page(
        &self,
        term: &str,
        after: Option<String>,
    ) -> Result<Page<Option<String>>, ScraperError> {
        let url = join_url(&self.search_base, "graphql-search-x");
        let mut query = vec![
            ("first", PAGE_SIZE),
            ("query_id", QUERY_ID),
            ("search_id", SEARCH_ID),
            ("term", term),
        ];
        if let Some(cursor) = after.as_deref() {
            query.push(("after", cursor));
        }

        let response: SearchResponse = self
            .fetcher
            .fetch_json(&url, &browser_headers(ACCEPT_JSON), &query)
            .await?;
        Ok(search_page_from_response(response, &self.web_base))
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] when no numeric product code can be
    /// read from `url`.
    pub async fn scrape_one(&self, url: &str) -> Result<ScrapedProduct, ScraperError> {
        let code = listing_code(url).ok_or_else(|| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: "no numeric product code at the end of the path".to_owned(),
        })?;
        self.fetch_product(code, url).await
    }

    /// Re-scrapes a stored record through its product code, read from the URL
    /// or, failing that, from the stored `EJ - <code>` value.
    pub(crate) async fn refresh(
        &self,
        existing: &CatalogProduct,
    ) -> Result<ScrapedProduct, ScraperError> {
        let code = listing_code(&existing.url)
            .or_else(|| {
                existing
                    .source_product_code
                    .as_deref()
                    .and_then(code_from_product_code)
            })
            .ok_or_else(|| ScraperError::InvalidUrl {
                url: existing.url.clone(),
                reason: "no product code in URL or stored record".to_owned(),
            })?;
        self.fetch_product(code, &existing.url).await
    }

    async fn fetch_product(&self, code: &str, url: &str) -> Result<ScrapedProduct, ScraperError> {
        let api_url = join_url(&self.pages_base, &format!("products/{code}/v2.json"));
        let product: EnjoeiProduct = self
            .fetcher
            .fetch_json(&api_url, &browser_headers(ACCEPT_JSON), &[])
            .await?;
        Ok(product_from_api(product, url, &self.photos_base))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    search: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    products: SearchProducts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchProducts {
    edges: Vec<SearchEdge>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchEdge {
    node: SearchNode,
    cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchNode {
    id: Option<Value>,
    path: Option<String>,
}

/// URLs plus the cursor of the last edge. The page is terminal when it has
/// no edges, no cursor, or the API reports no next page.
fn search_page_from_response(response: SearchResponse, web_base: &str) -> Page<Option<String>> {
    let products = response.data.search.products;
    let mut urls = Vec::with_capacity(products.edges.len());
    let mut cursor = None;

    for edge in products.edges {
        let url = match (non_empty(edge.node.path), edge.node.id.as_ref().and_then(id_string)) {
            (Some(path), _) => join_url(web_base, &path),
            (None, Some(id)) => join_url(web_base, &format!("p/{id}")),
            (None, None) => continue,
        };
        urls.push(url);
        if edge.cursor.is_some() {
            cursor = edge.cursor;
        }
    }

    let has_next = products
        .page_info
        .and_then(|p| p.has_next_page)
        .unwrap_or(true);
    let next = if urls.is_empty() || !has_next {
        None
    } else {
        cursor.map(Some)
    };
    Page { urls, next }
}

/// Numeric product code at the end of a listing or API URL:
/// `.../p/tenis-nike-84518121` and `.../products/84518121/v2.json` both give
/// `84518121`.
fn listing_code(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix("/v2.json").unwrap_or(path);
    let segment = path.rsplit('/').next()?;
    let code = segment.rsplit('-').next()?;
    (!code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

fn code_from_product_code(stored: &str) -> Option<&str> {
    let code = stored.split_once('-').map(|(_, c)| c.trim())?;
    (!code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnjoeiProduct {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    canonical_url: Option<String>,
    photos: Vec<String>,
    fallback_pricing: FallbackPricing,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FallbackPricing {
    price: PriceFields,
    state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PriceFields {
    listed: Option<Value>,
    sale: Option<Value>,
}

fn product_from_api(product: EnjoeiProduct, requested_url: &str, photos_base: &str) -> ScrapedProduct {
    let url = non_empty(product.canonical_url).unwrap_or_else(|| requested_url.to_owned());
    let price = product
        .fallback_pricing
        .price
        .listed
        .as_ref()
        .and_then(price_value)
        .or_else(|| product.fallback_pricing.price.sale.as_ref().and_then(price_value));
    let state = product.fallback_pricing.state;
    let slug = url
        .split(['?', '#'])
        .next()
        .and_then(|p| p.trim_end_matches('/').rsplit('/').next())
        .unwrap_or_default()
        .to_owned();
    let image_urls = product
        .photos
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|photo| join_url(photos_base, &format!("{slug}/1200xN/{}", photo.trim())))
        .collect();
    let id = product.id.as_ref().and_then(id_string);

    ScrapedProduct {
        title: non_empty(product.title).unwrap_or_default(),
        description: non_empty(product.description),
        source_product_code: id.as_deref().map(|id| Site::Enjoei.product_code(id)),
        city: None,
        state: None,
        seller_name: None,
        is_available: state.as_deref() == Some("published"),
        image_urls,
        price,
        raw_metadata: serde_json::json!({ "product_id": id, "pricing_state": state }),
        url,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Prices arrive as JSON numbers or strings, sometimes Brazilian-formatted.
fn price_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim())
            .ok()
            .or_else(|| parse_brl_price(s)),
        _ => None,
    }
}
