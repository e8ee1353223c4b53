//! OLX: offset page numbers, embedded JSON blobs.
//!
//! Search pages carry their results in the `__NEXT_DATA__` script; listing
//! pages carry the ad as HTML-escaped JSON in the `data-json` attribute of
//! `script#initial-data`.

use futures::stream::BoxStream;
use pricewatch_core::{parse_brl_price, ScrapedProduct};
use scraper::Html;
use serde::Deserialize;

use super::{browser_headers, non_empty, Site, ACCEPT_HTML};
use crate::client::Fetcher;
use crate::error::ScraperError;
use crate::html::{first_attr, script_text, selector};
use crate::pagination::{paginate, Page};

const BASE_URL: &str = "https://www.olx.com.br/brasil";

#[derive(Debug, Clone)]
pub struct OlxAdapter {
    fetcher: Fetcher,
    base_url: String,
    max_pages: usize,
}

impl OlxAdapter {
    #[must_use]
    pub fn new(fetcher: Fetcher, max_pages: usize) -> Self {
        Self::with_base_url(fetcher, max_pages, BASE_URL)
    }

    /// Points search requests at `base_url`. Used by tests against a mock server.
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
        paginate("olx", 1u32, self.max_pages, move |page| {
            self.search_page(term, page)
        })
    }

    async fn search_page(&self, term: &str, page: u32) -> Result<Page<u32>, ScraperError> {
        let offset = page.to_string();
        let body = match self
            .fetcher
            .fetch(
                &self.base_url,
                &browser_headers(ACCEPT_HTML),
                &[("q", term), ("o", &offset)],
            )
            .await
        {
            Ok(body) => body,
            Err(ScraperError::NotFound { .. }) => return Ok(Page::terminal()),
            Err(e) => return Err(e),
        };

        let urls = extract_search_links(&body);
        if urls.is_empty() {
            return Ok(Page::terminal());
        }
        Ok(Page {
            urls,
            next: Some(page + 1),
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::MissingData`] when the page has no ad blob.
    pub async fn scrape_one(&self, url: &str) -> Result<ScrapedProduct, ScraperError> {
        let body = self
            .fetcher
            .fetch(url, &browser_headers(ACCEPT_HTML), &[])
            .await?;
        parse_listing(url, &body)
    }
}

#[derive(Debug, Deserialize)]
struct NextData {
    props: NextProps,
}

#[derive(Debug, Deserialize)]
struct NextProps {
    #[serde(rename = "pageProps")]
    page_props: NextPageProps,
}

#[derive(Debug, Deserialize)]
struct NextPageProps {
    #[serde(default)]
    ads: Option<Vec<NextAd>>,
}

#[derive(Debug, Deserialize)]
struct NextAd {
    #[serde(default)]
    url: Option<String>,
}

/// Listing URLs from a search page, first occurrence order, no duplicates.
///
/// A page without the blob, or with a blob that does not parse, yields no
/// links and is treated as the terminal page.
fn extract_search_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(raw) = script_text(&doc, &selector("script#__NEXT_DATA__")) else {
        return Vec::new();
    };
    let data: NextData = match serde_json::from_str(&raw) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "olx search blob did not parse");
            return Vec::new();
        }
    };

    let mut urls: Vec<String> = Vec::new();
    for ad in data.props.page_props.ads.unwrap_or_default() {
        if let Some(url) = non_empty(ad.url) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

#[derive(Debug, Deserialize)]
struct InitialData {
    #[serde(default)]
    ad: Option<OlxAd>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OlxAd {
    subject: Option<String>,
    body: Option<String>,
    list_id: Option<serde_json::Value>,
    price_value: Option<String>,
    images: Vec<OlxImage>,
    user: Option<OlxUser>,
    location: Option<OlxLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlxImage {
    original: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlxUser {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OlxLocation {
    municipality: Option<String>,
    uf: Option<String>,
}

fn parse_listing(url: &str, html: &str) -> Result<ScrapedProduct, ScraperError> {
    let raw = {
        let doc = Html::parse_document(html);
        first_attr(&doc, &selector("script#initial-data"), "data-json")
    };
    let raw = raw.ok_or_else(|| ScraperError::MissingData {
        url: url.to_owned(),
        what: "initial-data blob",
    })?;

    let data: InitialData = serde_json::from_str(&raw).map_err(|e| ScraperError::Deserialize {
        context: format!("olx listing {url}"),
        source: e,
    })?;
    let ad = data.ad.ok_or_else(|| ScraperError::MissingData {
        url: url.to_owned(),
        what: "ad",
    })?;

    let price = ad.price_value.as_deref().and_then(parse_brl_price);
    let list_id = ad.list_id.map(|id| match id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });
    let location = ad.location.unwrap_or_default();

    Ok(ScrapedProduct {
        url: url.to_owned(),
        title: non_empty(ad.subject).unwrap_or_default(),
        description: non_empty(ad.body),
        source_product_code: list_id.as_deref().map(|id| Site::Olx.product_code(id)),
        city: non_empty(location.municipality),
        state: non_empty(location.uf),
        seller_name: non_empty(ad.user.and_then(|u| u.name)),
        is_available: price.is_some(),
        image_urls: ad
            .images
            .into_iter()
            .filter_map(|img| non_empty(img.original))
            .collect(),
        price,
        raw_metadata: serde_json::json!({ "list_id": list_id }),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    const SEARCH_PAGE: &str = r#"<html><body>
<script id="__NEXT_DATA__" type="application/json">
{"props":{"pageProps":{"ads":[
  {"url":"https://sp.olx.com.br/bike-1"},
  {"url":"https://sp.olx.com.br/bike-2"},
  {"url":"https://sp.olx.com.br/bike-1"},
  {"subject":"banner without url"}
]}}}
</script></body></html>"#;

    fn listing_page(ad_json: &str) -> String {
        let escaped = ad_json.replace('&', "&amp;").replace('"', "&quot;");
        format!(r#"<html><body><script id="initial-data" data-json="{escaped}"></script></body></html>"#)
    }

    #[test]
    fn search_links_are_deduplicated_in_order() {
        assert_eq!(
            extract_search_links(SEARCH_PAGE),
            vec!["https://sp.olx.com.br/bike-1", "https://sp.olx.com.br/bike-2"]
        );
    }

    #[test]
    fn search_page_without_blob_has_no_links() {
        assert!(extract_search_links("<html><body>Nenhum anúncio</body></html>").is_empty());
    }

    #[test]
    fn search_page_with_empty_ads_has_no_links() {
        let html = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"ads":[]}}}</script>"#;
        assert!(extract_search_links(html).is_empty());
    }

    #[test]
    fn listing_blob_maps_to_scraped_product() {
        let html = listing_page(
            r#"{"ad":{"subject":"Bicicleta aro 29","body":"Pouco uso & revisada","listId":1365326779,
                "priceValue":"R$ 1.250","images":[{"original":"https://img.olx.com.br/1.jpg"},{"original":""}],
                "user":{"name":"Ana"},"location":{"municipality":"Campinas","uf":"SP"}}}"#,
        );
        let product = parse_listing("https://sp.olx.com.br/bike-1", &html).unwrap();

        assert_eq!(product.title, "Bicicleta aro 29");
        assert_eq!(product.description.as_deref(), Some("Pouco uso & revisada"));
        assert_eq!(product.source_product_code.as_deref(), Some("OLX - 1365326779"));
        assert_eq!(product.price, Some(Decimal::new(1250, 0)));
        assert!(product.is_available);
        assert_eq!(product.city.as_deref(), Some("Campinas"));
        assert_eq!(product.state.as_deref(), Some("SP"));
        assert_eq!(product.seller_name.as_deref(), Some("Ana"));
        assert_eq!(product.image_urls, vec!["https://img.olx.com.br/1.jpg"]);
    }

    #[test]
    fn listing_without_price_is_unavailable() {
        let html = listing_page(r#"{"ad":{"subject":"Vendido","listId":"99"}}"#);
        let product = parse_listing("https://sp.olx.com.br/x", &html).unwrap();
        assert_eq!(product.price, None);
        assert!(!product.is_available);
        assert_eq!(product.source_product_code.as_deref(), Some("OLX - 99"));
        assert!(product.image_urls.is_empty());
    }

    #[test]
    fn listing_without_blob_is_missing_data() {
        let err = parse_listing("https://sp.olx.com.br/x", "<html></html>").unwrap_err();
        assert!(matches!(
            err,
            ScraperError::MissingData {
                what: "initial-data blob",
                ..
            }
        ));
    }
}
