//! Crawl jobs: turn `(site, term)` into newly persisted catalog products.

use chrono::Utc;
use futures::StreamExt;
use pricewatch_core::{NewCatalogProduct, ScrapedProduct};
use pricewatch_scraper::SiteAdapter;
use uuid::Uuid;

use crate::batch::{chunk_urls, new_urls};
use crate::error::IngestError;
use crate::outcome::{ChunkResult, CrawlSummary, FailedItem, ScrapeOutcome};
use crate::pool::WorkerPool;
use crate::Ingestor;

/// How persisting one scraped listing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Persisted {
    Created,
    SkippedExisting,
    Failed(String),
}

impl Ingestor {
    /// Runs one crawl job.
    ///
    /// The search is drained first; a failing search page ends pagination
    /// but the URLs already found are still processed. URLs the catalog
    /// already knows are dropped, the rest are scraped chunk by chunk with
    /// bounded concurrency, and each success is created unless the catalog
    /// has it by then.
    ///
    /// # Errors
    ///
    /// Only job-level failures: unknown site, site not registered in the
    /// catalog, or the catalog being unreachable when listing known URLs.
    /// Per-URL failures are reported in the summary.
    pub async fn crawl(&self, site_name: &str, term: &str) -> Result<CrawlSummary, IngestError> {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();
        let (adapter, site) = self.resolve_site(site_name).await?;
        let site_key = adapter.site().key();
        tracing::info!(%job_id, site = site_key, term, "crawl started");

        let (found, search_error) = drain_search(&adapter, term).await;
        if let Some(error) = &search_error {
            tracing::warn!(%job_id, site = site_key, term, %error, found = found.len(), "search stopped early");
        }

        let known = self.catalog.known_product_urls(site.id).await?;
        let found_count = found.len();
        let fresh = new_urls(found, &known);
        tracing::info!(%job_id, site = site_key, found = found_count, new = fresh.len(), "search deduplicated");

        let mut summary = CrawlSummary {
            job_id,
            site: site_key.to_owned(),
            term: term.to_owned(),
            started_at,
            finished_at: started_at,
            found: found_count,
            new: fresh.len(),
            created: 0,
            skipped_existing: 0,
            failed: 0,
            failed_urls: Vec::new(),
            failures: Vec::new(),
            search_error,
        };

        for (index, chunk) in chunk_urls(fresh, self.settings.chunk_size)
            .into_iter()
            .enumerate()
        {
            tracing::debug!(%job_id, chunk = index, urls = chunk.len(), "scraping chunk");
            let result = self.scrape_chunk(&adapter, chunk).await;

            for product in result.successes {
                let url = product.url.clone();
                match self.persist(product, site.id).await {
                    Persisted::Created => summary.created += 1,
                    Persisted::SkippedExisting => summary.skipped_existing += 1,
                    Persisted::Failed(reason) => summary.failures.push(FailedItem {
                        id: None,
                        url,
                        reason,
                    }),
                }
            }
            summary.failures.extend(result.failures);
        }

        for failure in &summary.failures {
            tracing::warn!(%job_id, url = %failure.url, reason = %failure.reason, "listing failed");
        }
        summary.failed = summary.failures.len();
        summary.failed_urls = summary.failures.iter().map(|f| f.url.clone()).collect();
        summary.finished_at = Utc::now();

        tracing::info!(
            %job_id,
            site = site_key,
            term,
            found = summary.found,
            new = summary.new,
            created = summary.created,
            skipped_existing = summary.skipped_existing,
            failed = summary.failed,
            "crawl finished"
        );
        Ok(summary)
    }

    /// Scrapes one chunk: one task per URL, all joined before returning.
    async fn scrape_chunk(&self, adapter: &SiteAdapter, urls: Vec<String>) -> ChunkResult {
        let jobs = urls.into_iter().map(|url| {
            let adapter = adapter.clone();
            let label = url.clone();
            let job = async move {
                match adapter.scrape_one(&url).await {
                    Ok(product) => ScrapeOutcome::Success(product),
                    Err(e) => ScrapeOutcome::Failure {
                        url,
                        reason: e.to_string(),
                    },
                }
            };
            (label, job)
        });
        let handles = self.pool.dispatch(jobs);
        let outcomes = WorkerPool::join(handles)
            .await
            .into_iter()
            .map(ScrapeOutcome::from_joined)
            .collect();
        ChunkResult::partition(outcomes)
    }

    /// Creates the product unless the catalog already has its URL.
    ///
    /// A rejected create is re-checked: if the URL exists by then, another
    /// job created it concurrently and this one counts it as skipped.
    pub(crate) async fn persist(&self, product: ScrapedProduct, site_id: i64) -> Persisted {
        match self.catalog.product_exists(&product.url).await {
            Ok(true) => return Persisted::SkippedExisting,
            Ok(false) => {}
            Err(e) => return Persisted::Failed(format!("existence check failed: {e}")),
        }

        let url = product.url.clone();
        let Some(new) = NewCatalogProduct::from_scraped(product, site_id) else {
            return Persisted::Failed("listing has no price".to_owned());
        };

        match self.catalog.create_product(&new).await {
            Ok(()) => Persisted::Created,
            Err(create_err) => match self.catalog.product_exists(&url).await {
                Ok(true) => {
                    tracing::debug!(url, "product created concurrently, skipping");
                    Persisted::SkippedExisting
                }
                _ => Persisted::Failed(format!("create failed: {create_err}")),
            },
        }
    }
}

/// Drains a search stream into a URL list. Stops at the first page error and
/// returns it alongside the URLs gathered so far.
async fn drain_search(adapter: &SiteAdapter, term: &str) -> (Vec<String>, Option<String>) {
    let mut stream = adapter.search(term);
    let mut urls = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(url) => urls.push(url),
            Err(e) => return (urls, Some(e.to_string())),
        }
    }
    (urls, None)
}
