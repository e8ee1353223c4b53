//! Mercado Livre: HTML DOM selectors, "next offset" computed from the running
//! result count.

use futures::stream::BoxStream;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use pricewatch_core::ScrapedProduct;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::Html;
use std::str::FromStr;

use super::{browser_headers, non_empty, Site, ACCEPT_HTML};
use crate::client::{join_url, Fetcher};
use crate::error::ScraperError;
use crate::html::{element_text, first_attr, first_text, selector};
use crate::pagination::{paginate, Page};

const BASE_URL: &str = "https://lista.mercadolivre.com.br";
const SPONSORED_PREFIX: &str = "https://click1";

/// Characters escaped in the search path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
pub struct MercadoLivreAdapter {
    fetcher: Fetcher,
    base_url: String,
    max_pages: usize,
}

impl MercadoLivreAdapter {
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
        paginate("mercado_livre", 0usize, self.max_pages, move |seen| {
            self.search_page(term, seen)
        })
    }

    async fn search_page(&self, term: &str, seen: usize) -> Result<Page<usize>, ScraperError> {
        let url = search_url(&self.base_url, term, seen);
        let body = match self
            .fetcher
            .fetch(&url, &browser_headers(ACCEPT_HTML), &[])
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
        let next = seen + urls.len();
        Ok(Page {
            urls,
            next: Some(next),
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::MissingData`] when the page has neither a
    /// title nor a price.
    pub async fn scrape_one(&self, url: &str) -> Result<ScrapedProduct, ScraperError> {
        let body = self
            .fetcher
            .fetch(url, &browser_headers(ACCEPT_HTML), &[])
            .await?;
        parse_listing(url, &body)
    }
}

/// Search page URL for a term after `seen` results: the first page is the bare
/// slug, later pages are `<slug>_Desde_<seen+1>_NoIndex_True`.
fn search_url(base_url: &str, term: &str, seen: usize) -> String {
    let slug = term.split_whitespace().collect::<Vec<_>>().join("-");
    let slug = utf8_percent_encode(&slug, PATH_SEGMENT).to_string();
    if seen == 0 {
        join_url(base_url, &slug)
    } else {
        join_url(base_url, &format!("{slug}_Desde_{}_NoIndex_True", seen + 1))
    }
}

fn extract_search_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&selector("a.poly-component__title-wrapper"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with(SPONSORED_PREFIX))
        .map(str::to_owned)
        .collect()
}

/// Item code from the `wid=` fragment parameter, else from an `MLB` id in
/// the path.
fn product_code(url: &str) -> Option<String> {
    let from_fragment = url.split_once('#').and_then(|(_, fragment)| {
        fragment
            .split('&')
            .find_map(|pair| pair.strip_prefix("wid="))
            .filter(|wid| !wid.is_empty())
            .map(str::to_owned)
    });
    from_fragment.or_else(|| {
        let re = Regex::new(r"MLB-?(\d+)").expect("valid MLB id regex");
        re.captures(url).map(|c| format!("MLB{}", &c[1]))
    })
}

fn parse_listing(url: &str, html: &str) -> Result<ScrapedProduct, ScraperError> {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, &selector("h1.ui-pdp-title"));
    let price = first_attr(&doc, &selector("meta[itemprop=price]"), "content")
        .and_then(|raw| Decimal::from_str(&raw).ok());
    if title.is_none() && price.is_none() {
        return Err(ScraperError::MissingData {
            url: url.to_owned(),
            what: "title and price",
        });
    }

    let is_available = doc
        .select(&selector(".ui-pdp-stock-information__title"))
        .next()
        .and_then(element_text)
        .is_some_and(|text| text.to_lowercase().contains("disponível"));
    let image_urls = first_attr(
        &doc,
        &selector("img.ui-pdp-image.ui-pdp-gallery__figure__image"),
        "src",
    )
    .into_iter()
    .collect();

    Ok(ScrapedProduct {
        url: url.to_owned(),
        title: title.unwrap_or_default(),
        description: non_empty(first_text(&doc, &selector("p.ui-pdp-description__content"))),
        source_product_code: product_code(url).map(|code| Site::MercadoLivre.product_code(code)),
        city: None,
        state: None,
        seller_name: None,
        is_available,
        image_urls,
        price,
        raw_metadata: serde_json::json!({}),
    })
}
