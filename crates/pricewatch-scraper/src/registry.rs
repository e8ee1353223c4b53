//! Adapter factory: site name to [`SiteAdapter`].

use std::collections::HashMap;

use crate::adapters::{
    EnjoeiAdapter, EstanteVirtualAdapter, MercadoLivreAdapter, OlxAdapter, Site, SiteAdapter,
};
use crate::client::Fetcher;
use crate::error::ScraperError;

/// Builds adapters for the fixed set of supported sites, all sharing one
/// [`Fetcher`].
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    fetcher: Fetcher,
    max_pages: usize,
    base_urls: HashMap<Site, String>,
}

impl AdapterFactory {
    #[must_use]
    pub fn new(fetcher: Fetcher, max_pages: usize) -> Self {
        Self {
            fetcher,
            max_pages,
            base_urls: HashMap::new(),
        }
    }

    /// Routes one site's requests to `base_url` instead of the live site.
    #[must_use]
    pub fn with_base_url(mut self, site: Site, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(site, base_url.into());
        self
    }

    /// Looks up `site_name` (registry key or catalog name, case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnsupportedSite`] for names outside the registry.
    pub fn create(&self, site_name: &str) -> Result<SiteAdapter, ScraperError> {
        let site: Site = site_name.parse()?;
        Ok(self.adapter_for(site))
    }

    #[must_use]
    pub fn adapter_for(&self, site: Site) -> SiteAdapter {
        let fetcher = self.fetcher.clone();
        let max_pages = self.max_pages;
        match (site, self.base_urls.get(&site)) {
            (Site::Olx, None) => SiteAdapter::Olx(OlxAdapter::new(fetcher, max_pages)),
            (Site::Olx, Some(base)) => {
                SiteAdapter::Olx(OlxAdapter::with_base_url(fetcher, max_pages, base.as_str()))
            }
            (Site::Enjoei, None) => SiteAdapter::Enjoei(EnjoeiAdapter::new(fetcher, max_pages)),
            (Site::Enjoei, Some(base)) => SiteAdapter::Enjoei(EnjoeiAdapter::with_base_url(
                fetcher,
                max_pages,
                base.as_str(),
            )),
            (Site::EstanteVirtual, None) => {
                SiteAdapter::EstanteVirtual(EstanteVirtualAdapter::new(fetcher, max_pages))
            }
            (Site::EstanteVirtual, Some(base)) => SiteAdapter::EstanteVirtual(
                EstanteVirtualAdapter::with_base_url(fetcher, max_pages, base.as_str()),
            ),
            (Site::MercadoLivre, None) => {
                SiteAdapter::MercadoLivre(MercadoLivreAdapter::new(fetcher, max_pages))
            }
            (Site::MercadoLivre, Some(base)) => SiteAdapter::MercadoLivre(
                MercadoLivreAdapter::with_base_url(fetcher, max_pages, base.as_str()),
            ),
        }
    }

    /// Every site the factory can build, in registry order.
    #[must_use]
    pub fn supported_sites() -> &'static [Site] {
        &Site::ALL
    }
}
