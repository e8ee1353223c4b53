//! Refresh jobs against a mocked catalog and a mocked OLX site.

mod common;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ingestor, mount_catalog_basics, mount_listing, OLX_SITE_ID};
use pricewatch_ingest::IngestError;

fn stale_record(id: i64, url: &str) -> serde_json::Value {
    json!({
        "id": id,
        "url": url,
        "title": format!("old title {id}"),
        "source_product_code": format!("OLX - {id}"),
        "city": "Recife",
        "state": "PE",
        "is_available": true,
        "source_website_id": OLX_SITE_ID,
        "current_price": 10.0
    })
}

#[tokio::test]
async fn refresh_updates_stale_records_and_skips_gone_listings() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;

    let live = format!("{}/anuncio-10", site.uri());
    let gone = format!("{}/anuncio-11", site.uri());
    let broken = format!("{}/anuncio-12", site.uri());
    let other_site = "https://www.enjoei.com.br/p/outra";

    let mut foreign = stale_record(13, other_site);
    foreign["source_website_id"] = json!(OLX_SITE_ID + 1);

    Mock::given(method("GET"))
        .and(path("/products/filter/"))
        .and(query_param_contains("updated_before", "T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            stale_record(10, &live),
            stale_record(11, &gone),
            stale_record(12, &broken),
            foreign,
        ])))
        .mount(&catalog)
        .await;

    mount_listing(&site, "/anuncio-10", 10, "R$ 1.250,00").await;
    Mock::given(method("GET"))
        .and(path("/anuncio-11"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/anuncio-12"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no blob</html>"))
        .mount(&site)
        .await;

    Mock::given(method("PUT"))
        .and(path("/products/10"))
        .and(body_partial_json(json!({
            "url": live,
            "title": "Anúncio 10",
            "source_website_id": OLX_SITE_ID,
            "price": 1250.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 10})))
        .expect(1)
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 2)
        .refresh("olx")
        .await
        .expect("refresh job completes");

    assert_eq!(summary.stale_days, 30);
    assert_eq!(summary.stale, 3);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_items[0].id, Some(12));
    assert_eq!(summary.failed_items[0].url, broken);
}

#[tokio::test]
async fn refresh_reports_rejected_update_as_failure() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;

    let url = format!("{}/anuncio-20", site.uri());
    Mock::given(method("GET"))
        .and(path("/products/filter/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stale_record(20, &url)])))
        .mount(&catalog)
        .await;
    mount_listing(&site, "/anuncio-20", 20, "R$ 99").await;
    Mock::given(method("PUT"))
        .and(path("/products/20"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100)
        .refresh_stale("olx", 7)
        .await
        .unwrap();

    assert_eq!(summary.stale_days, 7);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.failed_items[0].reason.starts_with("update failed"));
}

#[tokio::test]
async fn refresh_with_nothing_stale_is_a_no_op() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;
    Mock::given(method("GET"))
        .and(path("/products/filter/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&catalog)
        .await;

    let summary = ingestor(&catalog, &site, 100).refresh("olx").await.unwrap();

    assert_eq!(summary.stale, 0);
    assert_eq!(summary.updated + summary.skipped + summary.failed, 0);
}

#[tokio::test]
async fn refresh_with_huge_stale_days_is_job_error_not_panic() {
    let catalog = MockServer::start().await;
    let site = MockServer::start().await;
    mount_catalog_basics(&catalog).await;

    let ingestor = ingestor(&catalog, &site, 100);
    let joined = tokio::spawn(async move { ingestor.refresh_stale("olx", 100_000_000).await }).await;

    let result = joined.expect("refresh task must not panic");
    assert!(
        matches!(result, Err(IngestError::InvalidStaleDays(100_000_000))),
        "got: {result:?}"
    );
}
