//! Command handlers. Job summaries go to stdout as pretty JSON; logs go to
//! stderr.

use chrono::{NaiveDateTime, Utc};
use pricewatch_catalog::CatalogClient;
use pricewatch_core::{AppConfig, ScheduleTable};
use pricewatch_ingest::{IngestSettings, Ingestor};
use pricewatch_scraper::{AdapterFactory, Fetcher};
use serde::Serialize;

fn build_ingestor(config: &AppConfig) -> anyhow::Result<Ingestor> {
    let fetcher = Fetcher::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build fetcher: {e}"))?;
    let adapters = AdapterFactory::new(fetcher, config.scraper_max_pages);
    let catalog = CatalogClient::from_app_config(config)?;
    Ok(Ingestor::new(
        catalog,
        adapters,
        IngestSettings::from_app_config(config),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// # Errors
///
/// Job-level failures only: unknown site, site not registered, catalog down.
pub(crate) async fn run_crawl(config: &AppConfig, site: &str, term: &str) -> anyhow::Result<()> {
    let term = term.trim();
    if term.is_empty() {
        anyhow::bail!("--term must not be empty");
    }
    let summary = build_ingestor(config)?.crawl(site, term).await?;
    print_json(&summary)
}

/// # Errors
///
/// Job-level failures only: unknown site, site not registered, catalog down.
pub(crate) async fn run_refresh(
    config: &AppConfig,
    site: &str,
    stale_days: Option<i64>,
) -> anyhow::Result<()> {
    let ingestor = build_ingestor(config)?;
    let stale_days = stale_days.unwrap_or(ingestor.settings().stale_days);
    let summary = ingestor.refresh_stale(site, stale_days).await?;
    print_json(&summary)
}

pub(crate) async fn list_searches(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = CatalogClient::from_app_config(config)?;
    let searches = catalog.active_searches().await?;
    print_json(&searches)
}

/// Builds the schedule from the catalog exactly as a server resync would.
pub(crate) async fn print_schedule(config: &AppConfig, due_at: Option<&str>) -> anyhow::Result<()> {
    let catalog = CatalogClient::from_app_config(config)?;
    let specs = catalog.active_searches().await?;
    let table = ScheduleTable::build(&specs, Utc::now());

    match due_at {
        None => print_json(&table),
        Some(raw) => {
            let at = parse_local_minute(raw)?;
            let due: Vec<_> = table.due(at).collect();
            print_json(&due)
        }
    }
}

pub(crate) fn parse_local_minute(raw: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M")
        .map_err(|e| anyhow::anyhow!("invalid --due-at '{raw}': {e} (expected YYYY-MM-DDTHH:MM)"))
}
