//! Refresh jobs: re-scrape stale catalog records and push the fresh fields.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use pricewatch_core::MAX_STALE_DAYS;
use pricewatch_core::{CatalogProduct, CatalogProductUpdate};
use pricewatch_scraper::{RefreshedProduct, ScraperError, SiteAdapter};
use uuid::Uuid;

use crate::batch::chunk_urls;
use crate::error::IngestError;
use crate::outcome::{FailedItem, RefreshSummary};
use crate::pool::{Joined, WorkerPool};
use crate::Ingestor;

#[derive(Debug)]
enum RefreshOutcome {
    Refreshed(RefreshedProduct),
    /// The site answered 404: the listing is gone.
    Gone { id: i64 },
    Failure { id: i64, reason: String },
}

/// `now - stale_days`, rejecting thresholds outside `0..=MAX_STALE_DAYS` or
/// ones the calendar cannot represent.
fn stale_cutoff(now: DateTime<Utc>, stale_days: i64) -> Result<NaiveDateTime, IngestError> {
    if !(0..=MAX_STALE_DAYS).contains(&stale_days) {
        return Err(IngestError::InvalidStaleDays(stale_days));
    }
    Duration::try_days(stale_days)
        .and_then(|days| now.checked_sub_signed(days))
        .map(|cutoff| cutoff.naive_utc())
        .ok_or(IngestError::InvalidStaleDays(stale_days))
}

impl Ingestor {
    /// Refreshes records of `site_name` not updated in the configured number
    /// of days.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh_stale`].
    pub async fn refresh(&self, site_name: &str) -> Result<RefreshSummary, IngestError> {
        self.refresh_stale(site_name, self.settings.stale_days).await
    }

    /// Pulls records last updated more than `stale_days` ago, re-scrapes them
    /// with the same bounded fan-out as crawls, and updates each success.
    /// Per-record failures are reported, never fatal.
    ///
    /// # Errors
    ///
    /// Only job-level failures: a `stale_days` out of range, unknown site,
    /// site not registered, or the catalog being unreachable when listing
    /// stale records.
    pub async fn refresh_stale(
        &self,
        site_name: &str,
        stale_days: i64,
    ) -> Result<RefreshSummary, IngestError> {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();
        let cutoff = stale_cutoff(started_at, stale_days)?;
        let (adapter, site) = self.resolve_site(site_name).await?;
        let site_key = adapter.site().key();

        let stale = self.catalog.stale_products(site.id, cutoff).await?;
        tracing::info!(%job_id, site = site_key, stale_days, stale = stale.len(), %cutoff, "refresh started");

        let mut summary = RefreshSummary {
            job_id,
            site: site_key.to_owned(),
            started_at,
            finished_at: started_at,
            stale_days,
            stale: stale.len(),
            updated: 0,
            skipped: 0,
            failed: 0,
            failed_items: Vec::new(),
        };

        for chunk in chunk_urls(stale, self.settings.chunk_size) {
            let by_id: HashMap<i64, CatalogProduct> =
                chunk.iter().map(|p| (p.id, p.clone())).collect();

            for outcome in self.refresh_chunk(&adapter, chunk).await {
                match outcome {
                    RefreshOutcome::Refreshed(refreshed) => {
                        let Some(existing) = by_id.get(&refreshed.id) else {
                            continue;
                        };
                        let update =
                            CatalogProductUpdate::merge(existing, refreshed.product, site.id);
                        match self.catalog.update_product(existing.id, &update).await {
                            Ok(()) => summary.updated += 1,
                            Err(e) => summary.failed_items.push(FailedItem {
                                id: Some(existing.id),
                                url: existing.url.clone(),
                                reason: format!("update failed: {e}"),
                            }),
                        }
                    }
                    RefreshOutcome::Gone { id } => {
                        tracing::debug!(%job_id, id, "listing gone, skipping");
                        summary.skipped += 1;
                    }
                    RefreshOutcome::Failure { id, reason } => {
                        summary.failed_items.push(FailedItem {
                            id: Some(id),
                            url: by_id.get(&id).map(|p| p.url.clone()).unwrap_or_default(),
                            reason,
                        });
                    }
                }
            }
        }

        for item in &summary.failed_items {
            tracing::warn!(%job_id, url = %item.url, reason = %item.reason, "refresh failed");
        }
        summary.failed = summary.failed_items.len();
        summary.finished_at = Utc::now();

        tracing::info!(
            %job_id,
            site = site_key,
            stale = summary.stale,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "refresh finished"
        );
        Ok(summary)
    }

    async fn refresh_chunk(
        &self,
        adapter: &SiteAdapter,
        records: Vec<CatalogProduct>,
    ) -> Vec<RefreshOutcome> {
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let jobs = records.into_iter().map(|record| {
            let adapter = adapter.clone();
            let label = record.url.clone();
            let job = async move {
                match adapter.refresh_one(&record).await {
                    Ok(refreshed) => RefreshOutcome::Refreshed(refreshed),
                    Err(ScraperError::NotFound { .. }) => RefreshOutcome::Gone { id: record.id },
                    Err(e) => RefreshOutcome::Failure {
                        id: record.id,
                        reason: e.to_string(),
                    },
                }
            };
            (label, job)
        });

        let handles = self.pool.dispatch(jobs);
        WorkerPool::join(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, id)| match joined {
                Joined::Done(outcome) => outcome,
                Joined::Lost { reason, .. } => RefreshOutcome::Failure { id, reason },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn cutoff_subtracts_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let cutoff = stale_cutoff(now, 30).unwrap();
        assert_eq!(cutoff.to_string(), "2024-03-01 12:00:00");
        assert_eq!(stale_cutoff(now, 0).unwrap(), now.naive_utc());
    }

    #[test]
    fn cutoff_rejects_out_of_range_thresholds() {
        let now = Utc::now();
        assert!(matches!(
            stale_cutoff(now, 100_000_000),
            Err(IngestError::InvalidStaleDays(100_000_000))
        ));
        assert!(matches!(
            stale_cutoff(now, i64::MAX),
            Err(IngestError::InvalidStaleDays(_))
        ));
        assert!(matches!(
            stale_cutoff(now, -1),
            Err(IngestError::InvalidStaleDays(-1))
        ));
    }
}
