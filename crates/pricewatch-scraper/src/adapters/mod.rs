//! Per-marketplace adapters behind one capability surface.
//!
//! The set of supported sites is closed: [`Site`] names them and
//! [`SiteAdapter`] dispatches `search` / `scrape_one` / `refresh_one` to the
//! matching variant. Pagination cursors and parsing strategies stay inside
//! each variant's module.

mod enjoei;
mod estante_virtual;
mod mercado_livre;
mod olx;

use std::fmt;
use std::str::FromStr;

use futures::stream::BoxStream;
use pricewatch_core::{CatalogProduct, ScrapedProduct};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use crate::error::ScraperError;

pub use enjoei::EnjoeiAdapter;
pub use estante_virtual::EstanteVirtualAdapter;
pub use mercado_livre::MercadoLivreAdapter;
pub use olx::OlxAdapter;

/// A supported marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Olx,
    Enjoei,
    EstanteVirtual,
    MercadoLivre,
}

impl Site {
    pub const ALL: [Site; 4] = [
        Site::Olx,
        Site::Enjoei,
        Site::EstanteVirtual,
        Site::MercadoLivre,
    ];

    /// Registry key, as accepted by [`Site::from_str`].
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Site::Olx => "olx",
            Site::Enjoei => "enjoei",
            Site::EstanteVirtual => "estante_virtual",
            Site::MercadoLivre => "mercado_livre",
        }
    }

    /// Name under which the catalog stores the site (`GET /source_websites/name/{name}`).
    #[must_use]
    pub fn catalog_name(self) -> &'static str {
        match self {
            Site::Olx => "OLX",
            Site::Enjoei => "ENJOEI",
            Site::EstanteVirtual => "ESTANTE_VIRTUAL",
            Site::MercadoLivre => "MERCADO_LIVRE",
        }
    }

    /// Prefix of `source_product_code` values produced by this site's adapter.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Site::Olx => "OLX",
            Site::Enjoei => "EJ",
            Site::EstanteVirtual => "EV",
            Site::MercadoLivre => "ML",
        }
    }

    pub(crate) fn product_code(self, code: impl fmt::Display) -> String {
        format!("{} - {code}", self.code_prefix())
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Site {
    type Err = ScraperError;

    /// Accepts registry keys and catalog names, case-insensitively, with
    /// spaces or dashes in place of underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Site::ALL
            .into_iter()
            .find(|site| site.key() == normalized)
            .ok_or_else(|| ScraperError::UnsupportedSite(s.trim().to_owned()))
    }
}

/// A re-scraped catalog record, still carrying its catalog id.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedProduct {
    pub id: i64,
    pub product: ScrapedProduct,
}

/// Closed set of site adapters.
///
/// Cloning is cheap: every variant holds a [`crate::Fetcher`] (shared
/// connection pool) and a few strings.
#[derive(Debug, Clone)]
pub enum SiteAdapter {
    Olx(OlxAdapter),
    Enjoei(EnjoeiAdapter),
    EstanteVirtual(EstanteVirtualAdapter),
    MercadoLivre(MercadoLivreAdapter),
}

impl SiteAdapter {
    #[must_use]
    pub fn site(&self) -> Site {
        match self {
            SiteAdapter::Olx(_) => Site::Olx,
            SiteAdapter::Enjoei(_) => Site::Enjoei,
            SiteAdapter::EstanteVirtual(_) => Site::EstanteVirtual,
            SiteAdapter::MercadoLivre(_) => Site::MercadoLivre,
        }
    }

    /// Lazily streams listing URLs for `term`, page by page, until the site's
    /// terminal page. Every call restarts from the first page.
    ///
    /// A failing page is yielded as an `Err` and ends the stream; URLs from
    /// earlier pages have already been yielded.
    #[must_use]
    pub fn search<'a>(&'a self, term: &'a str) -> BoxStream<'a, Result<String, ScraperError>> {
        match self {
            SiteAdapter::Olx(a) => a.search(term),
            SiteAdapter::Enjoei(a) => a.search(term),
            SiteAdapter::EstanteVirtual(a) => a.search(term),
            SiteAdapter::MercadoLivre(a) => a.search(term),
        }
    }

    /// Fetches and parses one listing.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the fetch fails after retries or the page
    /// lacks the data every listing must have.
    pub async fn scrape_one(&self, url: &str) -> Result<ScrapedProduct, ScraperError> {
        match self {
            SiteAdapter::Olx(a) => a.scrape_one(url).await,
            SiteAdapter::Enjoei(a) => a.scrape_one(url).await,
            SiteAdapter::EstanteVirtual(a) => a.scrape_one(url).await,
            SiteAdapter::MercadoLivre(a) => a.scrape_one(url).await,
        }
    }

    /// Re-scrapes an existing catalog record, keeping its catalog id.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scrape_one`], plus [`ScraperError::InvalidUrl`] when the
    /// fetch target cannot be derived from the stored record.
    pub async fn refresh_one(
        &self,
        existing: &CatalogProduct,
    ) -> Result<RefreshedProduct, ScraperError> {
        let product = match self {
            SiteAdapter::Enjoei(a) => a.refresh(existing).await?,
            other => other.scrape_one(&existing.url).await?,
        };
        Ok(RefreshedProduct {
            id: existing.id,
            product,
        })
    }
}

/// Browser-like request headers sent to every marketplace. The user agent is
/// added per attempt by the fetcher.
pub(crate) fn browser_headers(accept: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Sec-GPC", HeaderValue::from_static("1"));
    headers
}

pub(crate) const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub(crate) const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// Trims and drops empty strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
