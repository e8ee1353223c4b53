//! Crawl and refresh orchestration: search, dedupe, chunk, bounded fan-out,
//! fan-in and idempotent persistence into the catalog.

pub mod batch;
pub mod crawl;
pub mod error;
pub mod outcome;
pub mod pool;
pub mod refresh;

use pricewatch_catalog::CatalogClient;
use pricewatch_core::{AppConfig, SiteIdentity};
use pricewatch_scraper::{AdapterFactory, SiteAdapter};

pub use batch::{chunk_urls, new_urls};
pub use error::IngestError;
pub use outcome::{ChunkResult, CrawlSummary, FailedItem, RefreshSummary, ScrapeOutcome};
pub use pool::WorkerPool;

/// Batching and staleness knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub worker_concurrency: usize,
    pub stale_days: i64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            worker_concurrency: 8,
            stale_days: 30,
        }
    }
}

impl IngestSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.ingest_chunk_size,
            worker_concurrency: config.ingest_worker_concurrency,
            stale_days: config.ingest_stale_days,
        }
    }
}

/// Runs crawl and refresh jobs.
///
/// Clones share the catalog client, the adapter factory and, importantly, the
/// worker pool: concurrent jobs draw scrape permits from the same bound.
#[derive(Debug, Clone)]
pub struct Ingestor {
    catalog: CatalogClient,
    adapters: AdapterFactory,
    pool: WorkerPool,
    settings: IngestSettings,
}

impl Ingestor {
    #[must_use]
    pub fn new(catalog: CatalogClient, adapters: AdapterFactory, settings: IngestSettings) -> Self {
        Self {
            pool: WorkerPool::new(settings.worker_concurrency),
            catalog,
            adapters,
            settings,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> IngestSettings {
        self.settings
    }

    /// Resolves the adapter and the catalog's row for `site_name`.
    async fn resolve_site(
        &self,
        site_name: &str,
    ) -> Result<(SiteAdapter, SiteIdentity), IngestError> {
        let adapter = self
            .adapters
            .create(site_name)
            .map_err(IngestError::UnsupportedSite)?;
        let catalog_name = adapter.site().catalog_name();
        let site = self
            .catalog
            .site_by_name(catalog_name)
            .await?
            .ok_or_else(|| IngestError::SiteNotRegistered(catalog_name.to_owned()))?;
        Ok((adapter, site))
    }
}
