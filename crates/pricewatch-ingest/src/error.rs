use thiserror::Error;

/// Job-level failures. Per-URL failures never surface here: they are counted
/// in the job summary instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    UnsupportedSite(pricewatch_scraper::ScraperError),

    /// The catalog has no site row under the adapter's catalog name.
    #[error("site {0} is not registered in the catalog")]
    SiteNotRegistered(String),

    /// The staleness threshold is negative or too large to subtract from now.
    #[error("stale_days {0} is out of range (0..={max})", max = pricewatch_core::MAX_STALE_DAYS)]
    InvalidStaleDays(i64),

    /// The catalog could not be reached or answered unexpectedly.
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] pricewatch_catalog::CatalogError),
}
