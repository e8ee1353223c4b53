use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub catalog_url: String,
    pub catalog_username: String,
    pub catalog_password: String,
    pub catalog_timeout_secs: u64,
    pub catalog_page_size: u32,
    pub scraper_request_timeout_secs: u64,
    pub scraper_connect_timeout_secs: u64,
    pub scraper_max_retries: u32,
    pub scraper_backoff_factor: u32,
    pub scraper_backoff_base_ms: u64,
    pub scraper_max_pages: usize,
    pub scraper_user_agents_path: Option<PathBuf>,
    pub scraper_fallback_user_agent: String,
    pub ingest_chunk_size: usize,
    pub ingest_worker_concurrency: usize,
    pub ingest_stale_days: i64,
    pub scheduler_resync_secs: u64,
    pub scheduler_refresh_cron: String,
    /// Sites refreshed on the fixed cadence. Empty means every registered site.
    pub scheduler_refresh_sites: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("catalog_url", &self.catalog_url)
            .field("catalog_username", &self.catalog_username)
            .field("catalog_password", &"[redacted]")
            .field("catalog_timeout_secs", &self.catalog_timeout_secs)
            .field("catalog_page_size", &self.catalog_page_size)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field(
                "scraper_connect_timeout_secs",
                &self.scraper_connect_timeout_secs,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field("scraper_backoff_factor", &self.scraper_backoff_factor)
            .field("scraper_backoff_base_ms", &self.scraper_backoff_base_ms)
            .field("scraper_max_pages", &self.scraper_max_pages)
            .field("scraper_user_agents_path", &self.scraper_user_agents_path)
            .field(
                "scraper_fallback_user_agent",
                &self.scraper_fallback_user_agent,
            )
            .field("ingest_chunk_size", &self.ingest_chunk_size)
            .field("ingest_worker_concurrency", &self.ingest_worker_concurrency)
            .field("ingest_stale_days", &self.ingest_stale_days)
            .field("scheduler_resync_secs", &self.scheduler_resync_secs)
            .field("scheduler_refresh_cron", &self.scheduler_refresh_cron)
            .field("scheduler_refresh_sites", &self.scheduler_refresh_sites)
            .finish()
    }
}
