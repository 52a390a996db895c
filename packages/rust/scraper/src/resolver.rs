//! Image resolution: page heuristics first, image search as last resort.

use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument, warn};
use url::Url;

use grimoire_search::ImageSearch;
use grimoire_shared::{GrimoireError, ImagePolicy, Result};

use crate::guard::is_private_target;
use crate::strategies::StrategyRegistry;

/// Picks one representative image URL for a product.
pub struct ImageResolver {
    client: Client,
    registry: StrategyRegistry,
    policy: ImagePolicy,
    image_search: ImageSearch,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_private_hosts: bool,
}

impl ImageResolver {
    pub fn new(client: Client, policy: ImagePolicy, image_search: ImageSearch) -> Self {
        Self {
            client,
            registry: StrategyRegistry::new(),
            policy,
            image_search,
            allow_private_hosts: false,
        }
    }

    /// Allow fetching pages on localhost/private IPs. Redirect hops are still
    /// checked by the client from [`http_client`](crate::http_client).
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    /// Resolve the best image for a product.
    ///
    /// With a page, the strategies run against its HTML; if the page cannot be
    /// fetched or no strategy matches, and whenever `page` is `None`, exactly
    /// one image search for `query` decides the outcome.
    #[instrument(skip_all, fields(query = %query, page = page.map(Url::as_str)))]
    pub async fn resolve(&self, page: Option<&Url>, query: &str) -> Option<Url> {
        if let Some(page) = page {
            match self.fetch_page(page).await {
                Ok(body) => {
                    if let Some(url) = self.scrape(&body, page) {
                        return Some(url);
                    }
                    debug!("no usable image on page");
                }
                Err(e) => {
                    debug!(error = %e, "page fetch failed");
                }
            }
        }

        self.image_search.find(query).await
    }

    /// Run the strategy chain over a page body.
    pub fn scrape(&self, body: &str, page: &Url) -> Option<Url> {
        let doc = Html::parse_document(body);
        let (url, strategy) = self.registry.first_match(&doc, page, &self.policy)?;
        debug!(%url, strategy, "image found on page");
        Some(url)
    }

    fn ensure_allowed(&self, url: &Url) -> Result<()> {
        if !self.allow_private_hosts && is_private_target(url) {
            warn!(%url, "refusing to fetch private host");
            return Err(GrimoireError::validation(format!("{url}: private host")));
        }
        Ok(())
    }

    async fn fetch_page(&self, page: &Url) -> Result<String> {
        self.ensure_allowed(page)?;

        let response = self
            .client
            .get(page.as_str())
            .send()
            .await
            .map_err(|e| GrimoireError::Network(format!("{page}: {e}")))?;

        // The final URL after redirects must pass the same check.
        self.ensure_allowed(response.url())?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrimoireError::Network(format!("{page}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| GrimoireError::Network(format!("{page}: body read failed: {e}")))
    }
}
