//! Google Custom Search JSON API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use grimoire_shared::{Credentials, GrimoireError, Result, SearchConfig, Throttle};

use crate::{SearchError, SearchKind, SearchProvider};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Grimoire/", env!("CARGO_PKG_VERSION"));

/// Error reasons Google uses for quota and rate-limit rejections.
const QUOTA_REASONS: [&str; 4] = [
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "quotaExceeded",
];

/// Custom Search client. Every request waits on the shared [`Throttle`].
pub struct GoogleSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    throttle: Arc<Throttle>,
}

impl GoogleSearch {
    /// Build a client from config and resolved credentials.
    pub fn new(config: &SearchConfig, credentials: &Credentials, throttle: Arc<Throttle>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GrimoireError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/customsearch/v1", config.base_url.trim_end_matches('/')),
            api_key: credentials.search_api_key.clone(),
            engine_id: credentials.search_engine_id.clone(),
            throttle,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    async fn top_result(&self, query: &str, kind: SearchKind) -> std::result::Result<Option<Url>, SearchError> {
        self.throttle.acquire().await;

        let mut params: Vec<(&str, &str)> = vec![
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", query),
            ("num", "1"),
        ];
        if kind == SearchKind::Image {
            params.push(("searchType", "image"));
        }

        debug!(query, kind = kind.as_str(), "issuing search request");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(format!("failed to read body: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }

        parse_top_link(&body)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Extract the first result link. A link that is not a valid URL counts as no result.
fn parse_top_link(body: &str) -> std::result::Result<Option<Url>, SearchError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;

    Ok(parsed
        .items
        .into_iter()
        .next()
        .and_then(|item| Url::parse(&item.link).ok()))
}

/// Map a non-success response to a [`SearchError`], separating quota
/// rejections from everything else.
fn classify_failure(status: u16, body: &str) -> SearchError {
    let api_error = serde_json::from_str::<ErrorResponse>(body).ok().map(|r| r.error);

    let quota_reason = api_error.as_ref().is_some_and(|e| {
        e.errors.iter().any(|d| QUOTA_REASONS.contains(&d.reason.as_str()))
            || e.status.as_deref() == Some("RESOURCE_EXHAUSTED")
    });

    let message = api_error
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status == 429 || (status == 403 && quota_reason) {
        SearchError::RateLimited { message }
    } else {
        SearchError::Api { status, message }
    }
}
