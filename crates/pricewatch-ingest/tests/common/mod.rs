//! Shared fixtures: a catalog mock and an OLX-shaped site mock.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricewatch_catalog::CatalogClient;
use pricewatch_ingest::{IngestSettings, Ingestor};
use pricewatch_scraper::{AdapterFactory, Fetcher, FetcherConfig, IdentityPool, RetryPolicy, Site};

pub const OLX_SITE_ID: i64 = 3;

pub fn ingestor(catalog: &MockServer, site: &MockServer, chunk_size: usize) -> Ingestor {
    let config = FetcherConfig {
        request_timeout_secs: 5,
        connect_timeout_secs: 5,
        retry: RetryPolicy {
            max_retries: 1,
            backoff_factor: 2,
            backoff_base: Duration::ZERO,
        },
        fallback_user_agent: "pricewatch-test/0.1".to_owned(),
    };
    let fetcher = Fetcher::new(&config, IdentityPool::new(Vec::new())).expect("test fetcher");
    let adapters = AdapterFactory::new(fetcher, 20).with_base_url(Site::Olx, site.uri());
    let catalog = CatalogClient::new(&catalog.uri(), "worker", "s3cret", 5, 100)
        .expect("test catalog client");
    Ingestor::new(
        catalog,
        adapters,
        IngestSettings {
            chunk_size,
            worker_concurrency: 4,
            stale_days: 30,
        },
    )
}

/// Login plus the OLX site row.
pub async fn mount_catalog_basics(catalog: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/source_websites/name/OLX"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": OLX_SITE_ID, "name": "OLX", "base_url": "https://www.olx.com.br", "is_active": true
        })))
        .mount(catalog)
        .await;
}

pub async fn mount_known_products(catalog: &MockServer, urls: &[String]) {
    let products: Vec<_> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| json!({ "id": i + 1, "url": url, "source_website_id": OLX_SITE_ID }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(products)))
        .mount(catalog)
        .await;
}

/// Serves one search page with `listing_paths` and then an empty page.
pub async fn mount_search(site: &MockServer, term: &str, listing_paths: &[&str]) {
    let ads: Vec<_> = listing_paths
        .iter()
        .map(|p| json!({ "url": format!("{}{p}", site.uri()) }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", term))
        .and(query_param("o", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(next_data(&json!(ads))))
        .mount(site)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", term))
        .and(query_param("o", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(next_data(&json!([]))))
        .mount(site)
        .await;
}

fn next_data(ads: &serde_json::Value) -> String {
    format!(
        r#"<html><script id="__NEXT_DATA__">{}</script></html>"#,
        json!({ "props": { "pageProps": { "ads": ads } } })
    )
}

/// Serves a listing page for `listing_path` with the given price.
pub async fn mount_listing(site: &MockServer, listing_path: &str, list_id: i64, price: &str) {
    let ad = json!({ "ad": { "subject": format!("Anúncio {list_id}"), "listId": list_id, "priceValue": price } })
        .to_string()
        .replace('"', "&quot;");
    Mock::given(method("GET"))
        .and(path(listing_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><script id="initial-data" data-json="{ad}"></script></html>"#
        )))
        .mount(site)
        .await;
}
