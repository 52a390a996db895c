//! Image strategy trait and built-in strategies for picking a product image.
//!
//! Strategies inspect a parsed product page and propose one image URL. They
//! are tried in priority order; the first one that yields a URL wins.

mod generic;
mod marketplace;
mod open_graph;

use grimoire_shared::ImagePolicy;
use scraper::Html;
use url::Url;

pub use generic::{GenericImageStrategy, image_candidates, select_candidate};
pub use marketplace::MarketplaceZoomStrategy;
pub use open_graph::OpenGraphStrategy;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for a single image-finding heuristic.
pub trait ImageStrategy: Send + Sync {
    /// Propose an image for the document, resolved against `page`.
    fn find(&self, doc: &Html, page: &Url, policy: &ImagePolicy) -> Option<Url>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Resolve an attribute value against the page URL. Inline `data:` images
/// are never usable.
pub(crate) fn resolve_against(page: &Url, raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    page.join(trimmed).ok().filter(|url| url.scheme() != "data")
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds image strategies in priority order.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn ImageStrategy>>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in strategies
    /// (marketplace zoom, then Open Graph, then generic `<img>` scan).
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(MarketplaceZoomStrategy),
                Box::new(OpenGraphStrategy),
                Box::new(GenericImageStrategy),
            ],
        }
    }

    /// Run the strategies in order and return the first proposal with the
    /// name of the strategy that produced it.
    pub fn first_match(&self, doc: &Html, page: &Url, policy: &ImagePolicy) -> Option<(Url, &str)> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.find(doc, page, policy).map(|url| (url, strategy.name())))
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
