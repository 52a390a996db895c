//! Marketplace gallery strategy.
//!
//! Mercado Livre style product pages keep the full-size picture in the
//! `data-zoom` attribute of the main gallery image.

use grimoire_shared::ImagePolicy;
use scraper::{Html, Selector};
use url::Url;

use super::{ImageStrategy, resolve_against};

const GALLERY_IMAGE: &str = "img.ui-pdp-gallery__figure__image[data-zoom]";

pub struct MarketplaceZoomStrategy;

impl ImageStrategy for MarketplaceZoomStrategy {
    fn find(&self, doc: &Html, page: &Url, _policy: &ImagePolicy) -> Option<Url> {
        let sel = Selector::parse(GALLERY_IMAGE).unwrap();
        doc.select(&sel)
            .filter_map(|el| el.value().attr("data-zoom"))
            .find_map(|zoom| resolve_against(page, zoom))
    }

    fn name(&self) -> &str {
        "marketplace-zoom"
    }
}
