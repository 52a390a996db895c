//! Generic (fallback) image strategy.
//!
//! Scans every `<img>` on the page. Used when neither the marketplace gallery
//! nor an Open Graph image is present.

use grimoire_shared::ImagePolicy;
use scraper::{Html, Selector};
use url::Url;

use super::{ImageStrategy, resolve_against};

/// Source attributes in preference order: high-res first, default `src` last.
const SOURCE_ATTRIBUTES: [&str; 3] = ["data-zoom", "data-src", "src"];

pub struct GenericImageStrategy;

impl ImageStrategy for GenericImageStrategy {
    fn find(&self, doc: &Html, page: &Url, policy: &ImagePolicy) -> Option<Url> {
        select_candidate(image_candidates(doc, page, policy), policy)
    }

    fn name(&self) -> &str {
        "generic-img"
    }
}

/// Every usable `<img>` source on the page, in document order, resolved to an
/// absolute URL. Inline `data:` images and blocked URLs are dropped.
pub fn image_candidates(doc: &Html, page: &Url, policy: &ImagePolicy) -> Vec<Url> {
    let sel = Selector::parse("img").unwrap();

    doc.select(&sel)
        .filter_map(|el| {
            SOURCE_ATTRIBUTES
                .iter()
                .filter_map(|attr| el.value().attr(attr))
                .find(|value| !value.trim().is_empty())
        })
        .filter_map(|src| resolve_against(page, src))
        .filter(|url| !policy.is_blocked(url.as_str()))
        .collect()
}

/// Pick the first candidate carrying a preferred token, else the first one.
pub fn select_candidate(candidates: Vec<Url>, policy: &ImagePolicy) -> Option<Url> {
    let preferred = candidates
        .iter()
        .position(|url| policy.is_preferred(url.as_str()));

    let mut candidates = candidates;
    match preferred {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    }
}
