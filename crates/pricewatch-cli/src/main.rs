mod jobs;

use clap::{Parser, Subcommand};
use pricewatch_core::MAX_STALE_DAYS;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch-cli")]
#[command(about = "Ad-hoc crawl and refresh jobs for the pricewatch pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search a site for a term and persist the new listings.
    Crawl {
        /// Site name, e.g. `olx` or `mercado_livre`.
        #[arg(long)]
        site: String,
        #[arg(long)]
        term: String,
    },
    /// Re-scrape stale records of a site.
    Refresh {
        #[arg(long)]
        site: String,
        /// Overrides `PRICEWATCH_INGEST_STALE_DAYS`.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_STALE_DAYS))]
        stale_days: Option<i64>,
    },
    /// List the active tracked searches.
    Searches,
    /// Print the schedule the server would build from the catalog right now.
    Schedule {
        /// Only list entries due at this local time (`YYYY-MM-DDTHH:MM`).
        #[arg(long)]
        due_at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Crawl { site, term } => jobs::run_crawl(&config, &site, &term).await,
        Commands::Refresh { site, stale_days } => {
            jobs::run_refresh(&config, &site, stale_days).await
        }
        Commands::Searches => jobs::list_searches(&config).await,
        Commands::Schedule { due_at } => jobs::print_schedule(&config, due_at.as_deref()).await,
    }
}
