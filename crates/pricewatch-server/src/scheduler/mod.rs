//! Background job scheduler.
//!
//! Three recurring jobs run on a [`JobScheduler`]:
//!
//! - resync: every `scheduler_resync_secs`, reads the active searches from
//!   the catalog, builds a fresh [`ScheduleTable`] and swaps it in whole.
//! - trigger: at second 0 of every minute, fires a crawl for each entry of
//!   the current table that is due at the local wall-clock minute.
//! - refresh: on `scheduler_refresh_cron`, refreshes stale records of the
//!   configured sites.
//!
//! Readers hold an `Arc` of whichever table was current when they looked, so
//! a half-built table is never observable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Utc};
use pricewatch_catalog::CatalogClient;
use pricewatch_core::{AppConfig, ScheduleTable};
use pricewatch_ingest::{IngestError, Ingestor};
use pricewatch_scraper::AdapterFactory;
use tokio::sync::watch;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Receiving side of the current schedule. Cheap to clone.
pub type ScheduleRx = watch::Receiver<Arc<ScheduleTable>>;
type ScheduleTx = Arc<watch::Sender<Arc<ScheduleTable>>>;

/// Builds and starts the background job scheduler.
///
/// Runs one resync before the scheduler starts so the first trigger tick
/// already sees the catalog's searches. Returns the running [`JobScheduler`],
/// which must be kept alive for the lifetime of the process, and a receiver
/// for the current schedule.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    ingestor: Ingestor,
    config: Arc<AppConfig>,
) -> Result<(JobScheduler, ScheduleRx), JobSchedulerError> {
    let (tx, rx) = watch::channel(Arc::new(ScheduleTable::empty()));
    let tx: ScheduleTx = Arc::new(tx);

    resync(ingestor.catalog(), &tx).await;

    let scheduler = JobScheduler::new().await?;
    register_resync_job(
        &scheduler,
        ingestor.catalog().clone(),
        Arc::clone(&tx),
        Duration::from_secs(config.scheduler_resync_secs.max(1)),
    )
    .await?;
    register_trigger_job(&scheduler, ingestor.clone(), rx.clone()).await?;
    register_refresh_job(&scheduler, ingestor, &config).await?;

    scheduler.start().await?;
    Ok((scheduler, rx))
}

async fn register_resync_job(
    scheduler: &JobScheduler,
    catalog: CatalogClient,
    tx: ScheduleTx,
    every: Duration,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_repeated_async(every, move |_uuid, _lock| {
        let catalog = catalog.clone();
        let tx = Arc::clone(&tx);
        Box::pin(async move {
            resync(&catalog, &tx).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(every_secs = every.as_secs(), "scheduler: registered resync job");
    Ok(())
}

/// Replaces the current table with one built from the catalog's active
/// searches. When the catalog cannot be read the previous table stays in
/// place and the next tick tries again.
pub(crate) async fn resync(catalog: &CatalogClient, tx: &watch::Sender<Arc<ScheduleTable>>) {
    let specs = match catalog.active_searches().await {
        Ok(specs) => specs,
        Err(e) => {
            tracing::warn!(error = %e, "scheduler: resync failed; keeping previous schedule");
            return;
        }
    };

    let table = ScheduleTable::build(&specs, Utc::now());
    let entries = table.len();
    let previous = tx.send_replace(Arc::new(table));
    if previous.len() != entries {
        tracing::info!(
            searches = specs.len(),
            entries,
            previous = previous.len(),
            "scheduler: schedule changed"
        );
    } else {
        tracing::debug!(searches = specs.len(), entries, "scheduler: schedule resynced");
    }
}

async fn register_trigger_job(
    scheduler: &JobScheduler,
    ingestor: Ingestor,
    rx: ScheduleRx,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let ingestor = ingestor.clone();
        let table = Arc::clone(&rx.borrow());
        Box::pin(async move {
            fire_due(&ingestor, &table, Local::now().naive_local());
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!("scheduler: registered trigger job");
    Ok(())
}

/// Spawns a crawl for every entry due at `now`. Returns how many fired.
pub(crate) fn fire_due(ingestor: &Ingestor, table: &ScheduleTable, now: NaiveDateTime) -> usize {
    let mut fired = 0;
    for entry in table.due(now) {
        let ingestor = ingestor.clone();
        let key = entry.key.clone();
        let site = entry.site.clone();
        let term = entry.term.clone();
        tracing::info!(key = %key, site = %site, term = %term, "scheduler: firing crawl");
        tokio::spawn(async move {
            if let Err(e) = ingestor.crawl(&site, &term).await {
                tracing::error!(key = %key, site = %site, term = %term, error = %e, "scheduler: crawl job failed");
            }
        });
        fired += 1;
    }
    fired
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    ingestor: Ingestor,
    config: &AppConfig,
) -> Result<(), JobSchedulerError> {
    let sites: Arc<[String]> = refresh_sites(config).into();
    let cron = config.scheduler_refresh_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let ingestor = ingestor.clone();
        let sites = Arc::clone(&sites);
        Box::pin(async move {
            tracing::info!(sites = sites.len(), "scheduler: starting refresh run");
            run_refresh(&ingestor, &sites).await;
            tracing::info!("scheduler: refresh run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered refresh job");
    Ok(())
}

/// Configured refresh sites, or every supported site when none are named.
fn refresh_sites(config: &AppConfig) -> Vec<String> {
    if config.scheduler_refresh_sites.is_empty() {
        AdapterFactory::supported_sites()
            .iter()
            .map(|s| s.key().to_owned())
            .collect()
    } else {
        config.scheduler_refresh_sites.clone()
    }
}

/// Refreshes each site in turn. One site's failure does not stop the others.
async fn run_refresh(ingestor: &Ingestor, sites: &[String]) {
    for site in sites {
        match ingestor.refresh(site).await {
            Ok(_) => {}
            Err(IngestError::SiteNotRegistered(name)) => {
                tracing::debug!(site = %name, "scheduler: site not in catalog; skipping refresh");
            }
            Err(e) => {
                tracing::error!(site = %site, error = %e, "scheduler: refresh job failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
