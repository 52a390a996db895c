//! Web and image search for product enrichment.
//!
//! A [`SearchProvider`] answers "what is the top result for this query".
//! [`PageLocator`] and [`ImageSearch`] wrap a provider and absorb every
//! failure: a missing page or image is an expected outcome, so callers only
//! ever see `Option<Url>`.

mod google;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use google::GoogleSearch;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Which result vertical to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Ranked web pages.
    Web,
    /// Image search; results link directly to image files.
    Image,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Image => "image",
        }
    }
}

/// Failure of a single search call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The provider rejected the call because a quota or rate limit was hit.
    #[error("search quota exceeded: {message}")]
    RateLimited { message: String },

    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("search request failed: {0}")]
    Request(String),

    /// Non-success HTTP status other than a rate limit.
    #[error("search API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("search response could not be decoded: {0}")]
    Decode(String),
}

/// A search backend returning at most one ranked result.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return the top result link for `query`, or `None` if there are no results.
    async fn top_result(&self, query: &str, kind: SearchKind) -> Result<Option<Url>, SearchError>;

    /// Provider name for tracing.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Failure-absorbing wrappers
// ---------------------------------------------------------------------------

/// Finds the most relevant sales page for a product.
#[derive(Clone)]
pub struct PageLocator {
    provider: Arc<dyn SearchProvider>,
}

impl PageLocator {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Return the top web result for `query`, or `None` on no result or any error.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn locate(&self, query: &str) -> Option<Url> {
        let outcome = self.provider.top_result(query, SearchKind::Web).await;
        let page = absorb(SearchKind::Web, outcome);
        if page.is_none() {
            info!("no sales page found");
        }
        page
    }
}

/// Text-to-image search, the last resort of image resolution.
#[derive(Clone)]
pub struct ImageSearch {
    provider: Arc<dyn SearchProvider>,
}

impl ImageSearch {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Return the top image result for `query`, or `None` on no result or any error.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn find(&self, query: &str) -> Option<Url> {
        info!("falling back to image search");
        let outcome = self.provider.top_result(query, SearchKind::Image).await;
        let image = absorb(SearchKind::Image, outcome);
        if let Some(url) = &image {
            info!(%url, "image found via image search");
        }
        image
    }
}

/// Downgrade a search outcome to an optional URL, logging failures.
///
/// Rate limits are reported separately so operators can tell an exhausted
/// quota from a flaky network; control flow is the same for both.
fn absorb(kind: SearchKind, outcome: Result<Option<Url>, SearchError>) -> Option<Url> {
    match outcome {
        Ok(Some(url)) => {
            debug!(kind = kind.as_str(), %url, "search hit");
            Some(url)
        }
        Ok(None) => None,
        Err(SearchError::RateLimited { message }) => {
            warn!(kind = kind.as_str(), %message, "search API quota exceeded");
            None
        }
        Err(e) => {
            warn!(kind = kind.as_str(), error = %e, "search failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Provider returning canned outcomes and recording every call.
    struct StubProvider {
        outcome: Result<Option<Url>, SearchError>,
        calls: Mutex<Vec<(String, SearchKind)>>,
    }

    impl StubProvider {
        fn new(outcome: Result<Option<Url>, SearchError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for StubProvider {
        async fn top_result(
            &self,
            query: &str,
            kind: SearchKind,
        ) -> Result<Option<Url>, SearchError> {
            self.calls.lock().unwrap().push((query.to_string(), kind));
            self.outcome.clone()
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    #[tokio::test]
    async fn locate_returns_top_page() {
        let page = Url::parse("http://shop.test/p1").unwrap();
        let stub = StubProvider::new(Ok(Some(page.clone())));
        let locator = PageLocator::new(stub.clone());

        assert_eq!(locator.locate("Widget").await, Some(page));
        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("Widget".to_string(), SearchKind::Web)]);
    }

    #[tokio::test]
    async fn locate_absorbs_rate_limit() {
        let stub = StubProvider::new(Err(SearchError::RateLimited {
            message: "daily limit".into(),
        }));
        let locator = PageLocator::new(stub);
        assert_eq!(locator.locate("Widget").await, None);
    }

    #[tokio::test]
    async fn locate_absorbs_transport_errors() {
        let stub = StubProvider::new(Err(SearchError::Request("connection reset".into())));
        let locator = PageLocator::new(stub);
        assert_eq!(locator.locate("Widget").await, None);
    }

    #[tokio::test]
    async fn image_search_uses_image_kind() {
        let image = Url::parse("http://img.test/widget.png").unwrap();
        let stub = StubProvider::new(Ok(Some(image.clone())));
        let search = ImageSearch::new(stub.clone());

        assert_eq!(search.find("Widget").await, Some(image));
        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0].1, SearchKind::Image);
    }

    #[test]
    fn search_error_display() {
        let err = SearchError::Api {
            status: 500,
            message: "backend error".into(),
        };
        assert_eq!(err.to_string(), "search API returned HTTP 500: backend error");
    }
}
