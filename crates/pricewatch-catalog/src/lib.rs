//! HTTP client for the catalog service that owns sites, search configs and
//! products.

pub mod client;
pub mod error;

pub use client::CatalogClient;
pub use error::CatalogError;
