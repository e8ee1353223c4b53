use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A listing as parsed from one marketplace fetch, normalized across sites.
///
/// Pipeline-internal: the orchestrators map it onto [`NewCatalogProduct`] or
/// [`CatalogProductUpdate`] and drop it after the hand-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Site-prefixed listing code, e.g. `"OLX - 1365326779"`.
    pub source_product_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub seller_name: Option<String>,
    pub is_available: bool,
    pub image_urls: Vec<String>,
    /// `None` when the listing page carries no price (sold, hidden, or the
    /// markup changed).
    pub price: Option<Decimal>,
    pub raw_metadata: serde_json::Value,
}

/// A product row as returned by the catalog (`GET /products/...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_product_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub image_urls: Option<String>,
    #[serde(default)]
    pub source_website_id: Option<i64>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
}

/// Body of `POST /products/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCatalogProduct {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub source_product_code: Option<String>,
    pub city: String,
    pub state: String,
    pub seller_name: Option<String>,
    pub is_available: bool,
    /// Comma-separated, the catalog stores image URLs in a single text column.
    pub image_urls: Option<String>,
    pub source_website_id: i64,
    pub source_metadata: serde_json::Value,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl NewCatalogProduct {
    /// Attach the catalog site id to a scraped listing.
    ///
    /// Returns `None` when the listing has no price: the catalog's create
    /// contract requires an initial price for the price history.
    #[must_use]
    pub fn from_scraped(product: ScrapedProduct, site_id: i64) -> Option<Self> {
        let price = product.price?;
        Some(Self {
            url: product.url,
            title: product.title,
            description: product.description,
            source_product_code: product.source_product_code,
            city: product.city.unwrap_or_default(),
            state: product.state.unwrap_or_default(),
            seller_name: product.seller_name,
            is_available: product.is_available,
            image_urls: join_image_urls(&product.image_urls),
            source_website_id: site_id,
            source_metadata: product.raw_metadata,
            price,
        })
    }
}

/// Body of `PUT /products/{id}`. The catalog appends a price-history entry
/// when `price` differs from the current price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProductUpdate {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub source_product_code: Option<String>,
    pub city: String,
    pub state: String,
    pub seller_name: Option<String>,
    pub is_available: bool,
    pub image_urls: Option<String>,
    pub source_website_id: i64,
    pub source_metadata: serde_json::Value,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

impl CatalogProductUpdate {
    /// Overlay freshly scraped fields on an existing catalog row.
    ///
    /// The existing URL is kept so the row stays addressable by the URL the
    /// crawl deduplicates against. Fields the fresh scrape could not determine
    /// fall back to the stored values.
    #[must_use]
    pub fn merge(existing: &CatalogProduct, fresh: ScrapedProduct, site_id: i64) -> Self {
        let image_urls = join_image_urls(&fresh.image_urls).or_else(|| existing.image_urls.clone());
        Self {
            url: existing.url.clone(),
            title: if fresh.title.is_empty() {
                existing.title.clone()
            } else {
                fresh.title
            },
            description: fresh.description.or_else(|| existing.description.clone()),
            source_product_code: fresh
                .source_product_code
                .or_else(|| existing.source_product_code.clone()),
            city: fresh
                .city
                .or_else(|| existing.city.clone())
                .unwrap_or_default(),
            state: fresh
                .state
                .or_else(|| existing.state.clone())
                .unwrap_or_default(),
            seller_name: fresh.seller_name.or_else(|| existing.seller_name.clone()),
            is_available: fresh.is_available,
            image_urls,
            source_website_id: existing.source_website_id.unwrap_or(site_id),
            source_metadata: fresh.raw_metadata,
            price: fresh.price,
        }
    }
}

fn join_image_urls(urls: &[String]) -> Option<String> {
    let joined = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Parses a Brazilian-formatted price such as `"R$ 1.234,56"`.
///
/// `.` is the thousands separator and `,` the decimal separator. Returns
/// `None` for empty or unparseable input.
#[must_use]
pub fn parse_brl_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = cleaned.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
#[path = "products_test.rs"]
mod tests;
