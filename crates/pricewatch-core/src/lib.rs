//! Shared domain types and configuration for the pricewatch crawl pipeline.

pub mod app_config;
pub mod config;
pub mod products;
pub mod schedule;
pub mod searches;
pub mod sites;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{
    load_app_config, load_app_config_from_env, DEFAULT_FALLBACK_USER_AGENT, MAX_STALE_DAYS,
};
pub use products::{
    parse_brl_price, CatalogProduct, CatalogProductUpdate, NewCatalogProduct, ScrapedProduct,
};
pub use schedule::{ScheduleEntry, ScheduleTable};
pub use searches::SearchSpec;
pub use sites::SiteIdentity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
