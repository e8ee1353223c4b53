//! Marketplace fetching, retry policy and per-site adapters.

pub mod adapters;
pub mod client;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod rate_limit;
pub mod registry;

mod html;

pub use adapters::{
    EnjoeiAdapter, EstanteVirtualAdapter, MercadoLivreAdapter, OlxAdapter, RefreshedProduct, Site, SiteAdapter,
};
pub use client::{Fetcher, FetcherConfig, FALLBACK_USER_AGENT};
pub use error::ScraperError;
pub use identity::IdentityPool;
pub use pagination::Page;
pub use rate_limit::RetryPolicy;
pub use registry::AdapterFactory;
