//! Open Graph preview image (`<meta property="og:image">`).

use grimoire_shared::ImagePolicy;
use scraper::{Html, Selector};
use url::Url;

use super::{ImageStrategy, resolve_against};

pub struct OpenGraphStrategy;

impl ImageStrategy for OpenGraphStrategy {
    fn find(&self, doc: &Html, page: &Url, _policy: &ImagePolicy) -> Option<Url> {
        let sel = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
        doc.select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|content| resolve_against(page, content))
    }

    fn name(&self) -> &str {
        "open-graph"
    }
}
