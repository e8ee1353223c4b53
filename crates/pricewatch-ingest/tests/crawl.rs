//! End-to-end crawl jobs against a mocked catalog and a mocked OLX site.

mod common;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ingestor, mount_catalog_basics, mount_known_products, mount_listing, mount_search};
use pricewatch_ingest::IngestError;

#[tokio::test]
async fn crawl_persists_successes_when_one_listing_fails() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(&catalog, &[]).await;

    mount_search(&site, "bicicleta", &["/anuncio-1", "/anuncio-2", "/anuncio-3"]).await;
    mount_listing(&site, "/anuncio-1", 1, "R$ 100").await;
    Mock::given(method("GET"))
        .and(path("/anuncio-2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&site)
        .await;
    mount_listing(&site, "/anuncio-3", 3, "R$ 300").await;

    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&catalog)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(2)
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100)
        .crawl("olx", "bicicleta")
        .await
        .expect("crawl completes despite a failing listing");

    assert_eq!(summary.found, 3);
    assert_eq!(summary.new, 3);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped_existing, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_urls, vec![format!("{}/anuncio-2", site.uri())]);
    assert!(summary.search_error.is_none());
}

#[tokio::test]
async fn crawl_skips_urls_already_in_catalog() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(
        &catalog,
        &[format!("{}/anuncio-1", site.uri()), format!("{}/anuncio-2", site.uri())],
    )
    .await;

    mount_search(
        &site,
        "fogão",
        &["/anuncio-1", "/anuncio-2", "/anuncio-3", "/anuncio-4"],
    )
    .await;
    mount_listing(&site, "/anuncio-3", 3, "R$ 30").await;
    mount_listing(&site, "/anuncio-4", 4, "R$ 40").await;

    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&catalog)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 1)
        .crawl("OLX", "fogão")
        .await
        .unwrap();

    assert_eq!(summary.found, 4);
    assert_eq!(summary.new, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn crawl_counts_existing_url_as_skipped_not_duplicate() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(&catalog, &[]).await;

    mount_search(&site, "sofa", &["/anuncio-1"]).await;
    mount_listing(&site, "/anuncio-1", 1, "R$ 500").await;

    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9, "url": "x"})))
        .mount(&catalog)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100)
        .crawl("olx", "sofa")
        .await
        .unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn crawl_treats_concurrent_create_as_skipped() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(&catalog, &[]).await;

    mount_search(&site, "mesa", &["/anuncio-1"]).await;
    mount_listing(&site, "/anuncio-1", 1, "R$ 80").await;

    // Absent on the first check, present on the re-check after the rejected create.
    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .mount(&catalog)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100)
        .crawl("olx", "mesa")
        .await
        .unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn crawl_reports_listing_without_price_as_failed() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(&catalog, &[]).await;

    mount_search(&site, "vendido", &["/anuncio-1"]).await;
    mount_listing(&site, "/anuncio-1", 1, "").await;

    Mock::given(method("GET"))
        .and(path_regex("^/products/url/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100)
        .crawl("olx", "vendido")
        .await
        .unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].reason, "listing has no price");
}

#[tokio::test]
async fn crawl_with_empty_search_creates_nothing() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    mount_known_products(&catalog, &[]).await;
    mount_search(&site, "nada", &[]).await;

    let summary = ingestor(&catalog, &site, 100)
        .crawl("olx", "nada")
        .await
        .unwrap();

    assert_eq!(summary.found, 0);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 0);
    assert!(summary.search_error.is_none());
}

#[tokio::test]
async fn crawl_for_unknown_site_is_job_error() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;

    let err = ingestor(&catalog, &site, 100)
        .crawl("ebay", "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedSite(_)), "got: {err:?}");
}

#[tokio::test]
async fn crawl_for_site_missing_from_catalog_is_job_error() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/source_websites/name/ENJOEI"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&catalog)
        .await;

    let err = ingestor(&catalog, &site, 100)
        .crawl("enjoei", "camisa")
        .await
        .unwrap_err();
    assert!(
        matches!(err, IngestError::SiteNotRegistered(ref name) if name == "ENJOEI"),
        "got: {err:?}"
    );
}
