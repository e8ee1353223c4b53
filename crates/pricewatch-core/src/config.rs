use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Identity sent when the user-agent pool is empty.
pub const DEFAULT_FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Largest accepted staleness threshold, in days (100 years).
pub const MAX_STALE_DAYS: i64 = 36_500;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_usize(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let catalog_url = require("PRICEWATCH_CATALOG_URL")?;
    let catalog_username = require("PRICEWATCH_CATALOG_USERNAME")?;
    let catalog_password = require("PRICEWATCH_CATALOG_PASSWORD")?;

    let env = parse_environment(&or_default("PRICEWATCH_ENV", "development"));
    let bind_addr = parse_addr("PRICEWATCH_BIND_ADDR", "0.0.0.0:3100")?;
    let log_level = or_default("PRICEWATCH_LOG_LEVEL", "info");

    let catalog_timeout_secs = parse_u64("PRICEWATCH_CATALOG_TIMEOUT_SECS", "10")?;
    let catalog_page_size = parse_u32("PRICEWATCH_CATALOG_PAGE_SIZE", "200")?.max(1);

    let scraper_request_timeout_secs = parse_u64("PRICEWATCH_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_connect_timeout_secs = parse_u64("PRICEWATCH_SCRAPER_CONNECT_TIMEOUT_SECS", "10")?;
    let scraper_max_retries = parse_u32("PRICEWATCH_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_backoff_factor = parse_u32("PRICEWATCH_SCRAPER_BACKOFF_FACTOR", "2")?;
    let scraper_backoff_base_ms = parse_u64("PRICEWATCH_SCRAPER_BACKOFF_BASE_MS", "1000")?;
    let scraper_max_pages = parse_positive("PRICEWATCH_SCRAPER_MAX_PAGES", "200")?;
    let scraper_user_agents_path = lookup("PRICEWATCH_SCRAPER_USER_AGENTS_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let scraper_fallback_user_agent = or_default(
        "PRICEWATCH_SCRAPER_FALLBACK_USER_AGENT",
        DEFAULT_FALLBACK_USER_AGENT,
    );

    let ingest_chunk_size = parse_positive("PRICEWATCH_INGEST_CHUNK_SIZE", "100")?;
    let ingest_worker_concurrency = parse_positive("PRICEWATCH_INGEST_WORKER_CONCURRENCY", "8")?;
    let ingest_stale_days = or_default("PRICEWATCH_INGEST_STALE_DAYS", "30")
        .parse::<i64>()
        .map_err(|e| invalid("PRICEWATCH_INGEST_STALE_DAYS", e.to_string()))?;
    if !(0..=MAX_STALE_DAYS).contains(&ingest_stale_days) {
        return Err(invalid(
            "PRICEWATCH_INGEST_STALE_DAYS",
            format!("must be between 0 and {MAX_STALE_DAYS}"),
        ));
    }

    let scheduler_resync_secs = parse_u64("PRICEWATCH_SCHEDULER_RESYNC_SECS", "60")?.max(1);
    let scheduler_refresh_cron = or_default("PRICEWATCH_SCHEDULER_REFRESH_CRON", "0 0 3 * * *");
    let scheduler_refresh_sites = parse_list(&or_default("PRICEWATCH_SCHEDULER_REFRESH_SITES", ""));

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        catalog_url,
        catalog_username,
        catalog_password,
        catalog_timeout_secs,
        catalog_page_size,
        scraper_request_timeout_secs,
        scraper_connect_timeout_secs,
        scraper_max_retries,
        scraper_backoff_factor,
        scraper_backoff_base_ms,
        scraper_max_pages,
        scraper_user_agents_path,
        scraper_fallback_user_agent,
        ingest_chunk_size,
        ingest_worker_concurrency,
        ingest_stale_days,
        scheduler_resync_secs,
        scheduler_refresh_cron,
        scheduler_refresh_sites,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

/// Split a comma-separated list, dropping blanks and lower-casing entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
