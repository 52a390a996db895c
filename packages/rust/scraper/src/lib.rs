//! Product page scraping, image resolution, and image download.
//!
//! This crate provides:
//! - [`strategies`]: Ordered heuristics that pick an image from a product page
//! - [`ImageResolver`]: Page heuristics with an image-search fallback
//! - [`ImageFetcher`]: Downloads the chosen image to disk
//! - [`http_client`]: The browser-like HTTP client both of them share

pub mod fetcher;
pub mod guard;
pub mod resolver;
pub mod strategies;

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;

use grimoire_shared::{GrimoireError, HttpConfig, Result};

pub use fetcher::{ImageFetcher, image_file_name};
pub use guard::is_private_target;
pub use resolver::ImageResolver;
pub use strategies::{
    GenericImageStrategy, ImageStrategy, MarketplaceZoomStrategy, OpenGraphStrategy,
    StrategyRegistry, image_candidates, select_candidate,
};

/// Maximum number of redirects followed for pages and images.
const MAX_REDIRECTS: usize = 5;

/// Build the HTTP client used for page scraping and image download.
///
/// Redirect hops are checked with [`is_private_target`] regardless of any
/// per-component opt-in, so a public URL can never bounce to a private host.
pub fn http_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(redirect_policy())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| GrimoireError::Network(format!("failed to build HTTP client: {e}")))
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if is_private_target(attempt.url()) {
            let target = attempt.url().to_string();
            attempt.error(format!("redirect to private host {target}"))
        } else {
            attempt.follow()
        }
    })
}
