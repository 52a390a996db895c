//! Core domain types for product enrichment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// Image URL written to the export when no image could be found.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400/eee/ccc?text=Image+Not+Found";

/// Export marker for a product whose image was never found.
pub const IMAGE_NOT_FOUND_MARKER: &str = "image not found";

/// Export marker for a found image whose download failed.
pub const DOWNLOAD_FAILED_MARKER: &str = "error downloading image";

/// Export marker for a product without a located sales page.
pub const NO_PAGE_MARKER: &str = "N/A";

/// Status written for every enriched product.
pub const ACTIVE_STATUS: &str = "active";

/// Substrings that identify a failure marker in exported text.
const FAILURE_TOKENS: [&str; 2] = ["not found", "error"];

/// Whether an exported image/path field holds a failure marker rather than
/// a real URL or path.
pub fn is_failure_marker(value: &str) -> bool {
    let lower = value.to_lowercase();
    FAILURE_TOKENS.iter().any(|token| lower.contains(token))
}

// ---------------------------------------------------------------------------
// ProductInput
// ---------------------------------------------------------------------------

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    /// Unique within a run; used as the image file stem.
    pub sku: String,
    /// Free text, used as the search query.
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Typed failure values
// ---------------------------------------------------------------------------

/// Outcome of image resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Found(Url),
    NotFound,
}

impl ImageSource {
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Found(url) => Some(url),
            Self::NotFound => None,
        }
    }
}

impl From<Option<Url>> for ImageSource {
    fn from(url: Option<Url>) -> Self {
        url.map_or(Self::NotFound, Self::Found)
    }
}

/// Outcome of the image download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalImage {
    /// The image was written to this path.
    Saved(PathBuf),
    /// There was nothing to download.
    NotFound,
    /// A download was attempted and failed.
    DownloadFailed { reason: String },
}

impl LocalImage {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }

    /// Export rendering: the path, or a failure marker.
    pub fn display_value(&self) -> String {
        match self {
            Self::Saved(path) => path.display().to_string(),
            Self::NotFound => IMAGE_NOT_FOUND_MARKER.to_string(),
            Self::DownloadFailed { .. } => DOWNLOAD_FAILED_MARKER.to_string(),
        }
    }
}

/// Short and long marketing copy for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptions {
    /// One or two lines of plain text.
    pub short: String,
    /// HTML fragment.
    pub long: String,
}

// ---------------------------------------------------------------------------
// EnrichmentResult
// ---------------------------------------------------------------------------

/// The enriched record for one product. Constructed once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    input: ProductInput,
    descriptions: Descriptions,
    source_page: Option<Url>,
    image: ImageSource,
    local_image: LocalImage,
}

impl EnrichmentResult {
    pub fn new(
        input: ProductInput,
        source_page: Option<Url>,
        image: ImageSource,
        local_image: LocalImage,
        descriptions: Descriptions,
    ) -> Self {
        Self {
            input,
            descriptions,
            source_page,
            image,
            local_image,
        }
    }

    pub fn name(&self) -> &str {
        &self.input.name
    }

    pub fn sku(&self) -> &str {
        &self.input.sku
    }

    pub fn price(&self) -> f64 {
        self.input.price
    }

    pub fn stock(&self) -> i64 {
        self.input.quantity
    }

    /// Shipping weight is not known for scraped products.
    pub fn weight(&self) -> u32 {
        0
    }

    pub fn status(&self) -> &'static str {
        ACTIVE_STATUS
    }

    pub fn short_description(&self) -> &str {
        &self.descriptions.short
    }

    pub fn long_description(&self) -> &str {
        &self.descriptions.long
    }

    pub fn source_page(&self) -> Option<&Url> {
        self.source_page.as_ref()
    }

    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    pub fn local_image(&self) -> &LocalImage {
        &self.local_image
    }

    /// Image URL for the export; never empty.
    pub fn image_url(&self) -> &str {
        self.image.url().map_or(PLACEHOLDER_IMAGE_URL, Url::as_str)
    }

    /// Sales page URL for the export, or [`NO_PAGE_MARKER`].
    pub fn source_page_url(&self) -> &str {
        self.source_page
            .as_ref()
            .map_or(NO_PAGE_MARKER, |url| url.as_str())
    }
}
