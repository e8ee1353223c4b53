mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use pricewatch_catalog::CatalogClient;
use pricewatch_ingest::{IngestSettings, Ingestor};
use pricewatch_scraper::{AdapterFactory, Fetcher};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(pricewatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting pricewatch-server");

    let fetcher = Fetcher::from_app_config(&config)?;
    let adapters = AdapterFactory::new(fetcher, config.scraper_max_pages);
    let catalog = CatalogClient::from_app_config(&config)?;
    let ingestor = Ingestor::new(catalog, adapters, IngestSettings::from_app_config(&config));

    let (_scheduler, schedule) =
        scheduler::build_scheduler(ingestor.clone(), Arc::clone(&config)).await?;

    let app = build_app(AppState { ingestor, schedule });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
