//! Per-task outcomes and the job summaries built from them.

use chrono::{DateTime, Utc};
use pricewatch_core::ScrapedProduct;
use serde::Serialize;
use uuid::Uuid;

use crate::pool::Joined;

/// Result of one fetch-and-parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Success(ScrapedProduct),
    Failure { url: String, reason: String },
}

impl ScrapeOutcome {
    /// Folds a joined worker task into an outcome; a lost task is a failure
    /// for the URL it was scraping.
    pub(crate) fn from_joined(joined: Joined<ScrapeOutcome>) -> Self {
        match joined {
            Joined::Done(outcome) => outcome,
            Joined::Lost { label, reason } => ScrapeOutcome::Failure { url: label, reason },
        }
    }
}

/// Successes and failures of one chunk, after every task finished.
#[derive(Debug, Default)]
pub struct ChunkResult {
    pub successes: Vec<ScrapedProduct>,
    pub failures: Vec<FailedItem>,
}

impl ChunkResult {
    #[must_use]
    pub fn partition(outcomes: Vec<ScrapeOutcome>) -> Self {
        let mut result = Self::default();
        for outcome in outcomes {
            match outcome {
                ScrapeOutcome::Success(product) => result.successes.push(product),
                ScrapeOutcome::Failure { url, reason } => {
                    result.failures.push(FailedItem {
                        id: None,
                        url,
                        reason,
                    });
                }
            }
        }
        result
    }
}

/// One URL or catalog record a job could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Catalog id, for refresh jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    pub reason: String,
}

/// Terminal report of a crawl job.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub job_id: Uuid,
    pub site: String,
    pub term: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// URLs yielded by the search.
    pub found: usize,
    /// URLs left after removing those the catalog already knows.
    pub new: usize,
    pub created: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub failed_urls: Vec<String>,
    pub failures: Vec<FailedItem>,
    /// Set when pagination stopped on an error; URLs from earlier pages were
    /// still processed.
    pub search_error: Option<String>,
}

/// Terminal report of a refresh job.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub job_id: Uuid,
    pub site: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stale_days: i64,
    /// Stale records pulled from the catalog.
    pub stale: usize,
    pub updated: usize,
    /// Listings that no longer exist on the site; left untouched.
    pub skipped: usize,
    pub failed: usize,
    pub failed_items: Vec<FailedItem>,
}
