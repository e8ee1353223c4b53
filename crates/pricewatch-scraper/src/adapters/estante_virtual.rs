//! Estante Virtual: JSON search API with page numbers, listing state in an
//! inline `window.__INITIAL_STATE__` script.

use futures::stream::BoxStream;
use pricewatch_core::ScrapedProduct;
use rust_decimal::Decimal;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;

use super::{browser_headers, non_empty, Site, ACCEPT_HTML, ACCEPT_JSON};
use crate::client::{join_url, Fetcher};
use crate::error::ScraperError;
use crate::html::selector;
use crate::pagination::{paginate, Page};

const BASE_URL: &str = "https://www.estantevirtual.com.br";
const STATIC_BASE_URL: &str = "https://static.estantevirtual.com.br";
const STATE_MARKER: &str = "window.__INITIAL_STATE__";

#[derive(Debug, Clone)]
pub struct EstanteVirtualAdapter {
    fetcher: Fetcher,
    base_url: String,
    max_pages: usize,
}

impl EstanteVirtualAdapter {
    #[must_use]
    pub fn new(fetcher: Fetcher, max_pages: usize) -> Self {
        Self::with_base_url(fetcher, max_pages, BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(fetcher: Fetcher, max_pages: usize, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            max_pages,
        }
    }

    #[must_use]
    pub fn search<'a>(&'a self, term: &'a str) -> BoxStream<'a, Result<String, ScraperError>> {
        paginate("estante_virtual", 1u32, self.max_pages, move |page| {
            self.search_page(term, page)
        })
    }

    async fn search_page(&self, term: &str, page: u32) -> Result<Page<u32>, ScraperError> {
        let url = join_url(&self.base_url, "busca/api");
        let page_param = page.to_string();
        let response: SearchResponse = self
            .fetcher
            .fetch_json(
                &url,
                &browser_headers(ACCEPT_JSON),
                &[
                    ("q", term),
                    ("searchField", "titulo-autor"),
                    ("page", &page_param),
                ],
            )
            .await?;
        Ok(search_page_from_response(response, page, &self.base_url))
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::MissingData`] when the page has no state blob.
    pub async fn scrape_one(&self, url: &str) -> Result<ScrapedProduct, ScraperError> {
        let body = self
            .fetcher
            .fetch(url, &browser_headers(ACCEPT_HTML), &[])
            .await?;
        parse_listing(url, &body)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchResponse {
    total_pages: Option<u32>,
    parent_skus: Vec<ParentSku>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParentSku {
    product_slug: Option<String>,
}

/// The page is terminal when it is empty or when `page` equals the reported
/// `totalPages` (or exceeds it).
fn search_page_from_response(response: SearchResponse, page: u32, base_url: &str) -> Page<u32> {
    let urls: Vec<String> = response
        .parent_skus
        .into_iter()
        .filter_map(|sku| non_empty(sku.product_slug))
        .map(|slug| join_url(base_url, &slug))
        .collect();

    let last_page = response.total_pages.is_none_or(|total| page >= total);
    let next = (!urls.is_empty() && !last_page).then_some(page + 1);
    Page { urls, next }
}

/// Extracts the JSON assigned to `window.__INITIAL_STATE__`. Anything after
/// the first complete JSON value (`;`, more statements) is ignored.
fn initial_state(html: &str) -> Option<Value> {
    let doc = Html::parse_document(html);
    let script = doc
        .select(&selector("script"))
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(STATE_MARKER))?;

    let after_marker = &script[script.find(STATE_MARKER)? + STATE_MARKER.len()..];
    let json_start = after_marker.trim_start().strip_prefix('=')?;
    serde_json::Deserializer::from_str(json_start)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn str_at<'v>(value: &'v Value, pointer: &str) -> Option<&'v str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn parse_listing(url: &str, html: &str) -> Result<ScrapedProduct, ScraperError> {
    let state = initial_state(html).ok_or_else(|| ScraperError::MissingData {
        url: url.to_owned(),
        what: "__INITIAL_STATE__ blob",
    })?;
    let product = state.get("Product").ok_or_else(|| ScraperError::MissingData {
        url: url.to_owned(),
        what: "Product state",
    })?;
    let empty = Value::Null;
    let current = product.get("currentProduct").unwrap_or(&empty);

    let name = str_at(product, "/name").or_else(|| str_at(current, "/name"));
    let author = str_at(product, "/author").or_else(|| str_at(current, "/author"));
    let title = match (name.map(str::trim), author.map(str::trim)) {
        (Some(n), Some(a)) if !a.is_empty() => format!("{n} | {a}"),
        (Some(n), _) => n.to_owned(),
        (None, Some(a)) => a.to_owned(),
        (None, None) => String::new(),
    };

    let price = current
        .pointer("/price/saleInCents")
        .and_then(Value::as_i64)
        .map(|cents| Decimal::new(cents, 2));

    let id = product
        .get("id")
        .or_else(|| current.get("id"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    let image_urls = current
        .pointer("/images/details")
        .and_then(Value::as_array)
        .and_then(|details| details.first())
        .and_then(Value::as_str)
        .map(|path| vec![join_url(STATIC_BASE_URL, path)])
        .unwrap_or_default();

    Ok(ScrapedProduct {
        url: url.to_owned(),
        title,
        description: non_empty(str_at(current, "/description").map(str::to_owned)),
        source_product_code: id.as_deref().map(|id| Site::EstanteVirtual.product_code(id)),
        city: non_empty(first_offer_city(product)),
        state: None,
        seller_name: non_empty(str_at(current, "/price/seller/name").map(str::to_owned)),
        is_available: current
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        image_urls,
        price,
        raw_metadata: serde_json::json!({ "sku": str_at(current, "/sku") }),
    })
}

/// City of the first offer, new copies before used ones.
fn first_offer_city(product: &Value) -> Option<String> {
    ["novo", "usado"].iter().find_map(|condition| {
        product
            .pointer(&format!("/grouper/groupProducts/{condition}/prices/0/city"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><head>
<script>window.dataLayer = [];</script>
<script>window.__INITIAL_STATE__ = {"Product":{"id":"abc123","name":"Dom Casmurro","author":"Machado de Assis",
 "currentProduct":{"description":"Edição de bolso","sku":"SKU9","available":true,
   "price":{"saleInCents":2590,"seller":{"name":"Sebo do Centro"}},
   "images":{"details":["/livros/dom-casmurro.jpg"]}},
 "grouper":{"groupProducts":{"usado":{"prices":[{"city":"Recife"}]}}}}};window.__OTHER__ = 1;</script>
</head></html>"#;

    #[test]
    fn search_page_stops_at_reported_total() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"totalPages":2,"parentSkus":[{"productSlug":"/livro/a"},{"productSlug":"/livro/b"}]}"#,
        )
        .unwrap();
        let page = search_page_from_response(response, 2, "https://www.estantevirtual.com.br");
        assert_eq!(
            page.urls,
            vec![
                "https://www.estantevirtual.com.br/livro/a",
                "https://www.estantevirtual.com.br/livro/b"
            ]
        );
        assert_eq!(page.next, None);
    }

    #[test]
    fn search_page_before_total_continues() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"totalPages":5,"parentSkus":[{"productSlug":"/livro/a"}]}"#)
                .unwrap();
        let page = search_page_from_response(response, 1, "https://www.estantevirtual.com.br");
        assert_eq!(page.next, Some(2));
    }

    #[test]
    fn empty_search_page_is_terminal() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"totalPages":0,"parentSkus":[]}"#).unwrap();
        let page = search_page_from_response(response, 1, "https://www.estantevirtual.com.br");
        assert!(page.urls.is_empty());
        assert_eq!(page.next, None);
    }

    #[test]
    fn initial_state_ignores_trailing_statements() {
        let state = initial_state(LISTING).unwrap();
        assert_eq!(state["Product"]["id"], "abc123");
    }

    #[test]
    fn listing_maps_to_scraped_product() {
        let product = parse_listing("https://www.estantevirtual.com.br/livro/a", LISTING).unwrap();
        assert_eq!(product.title, "Dom Casmurro | Machado de Assis");
        assert_eq!(product.price, Some(Decimal::new(2590, 2)));
        assert_eq!(product.source_product_code.as_deref(), Some("EV - abc123"));
        assert_eq!(product.seller_name.as_deref(), Some("Sebo do Centro"));
        assert_eq!(product.city.as_deref(), Some("Recife"));
        assert_eq!(product.description.as_deref(), Some("Edição de bolso"));
        assert!(product.is_available);
        assert_eq!(
            product.image_urls,
            vec!["https://static.estantevirtual.com.br/livros/dom-casmurro.jpg"]
        );
    }

    #[test]
    fn listing_without_state_is_missing_data() {
        let err = parse_listing("https://x", "<html><script>var a = 1;</script></html>").unwrap_err();
        assert!(matches!(err, ScraperError::MissingData { .. }));
    }

    #[test]
    fn listing_without_price_has_no_price() {
        let html = r#"<script>window.__INITIAL_STATE__ = {"Product":{"name":"Livro","currentProduct":{}}}</script>"#;
        let product = parse_listing("https://x", html).unwrap();
        assert_eq!(product.title, "Livro");
        assert_eq!(product.price, None);
        assert!(!product.is_available);
    }
}
