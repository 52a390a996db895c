//! Gemini `generateContent` client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use grimoire_shared::{Credentials, GeminiConfig, GrimoireError, Result, Throttle};

use super::{ModelError, TextModel};

const USER_AGENT: &str = concat!("Grimoire/", env!("CARGO_PKG_VERSION"));

/// Google's status string for exhausted quotas.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Gemini model over the REST API. Every call waits on the shared [`Throttle`].
pub struct GeminiModel {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    throttle: Arc<Throttle>,
}

impl GeminiModel {
    pub fn new(config: &GeminiConfig, credentials: &Credentials, throttle: Arc<Throttle>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GrimoireError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
            api_key: credentials.gemini_api_key.clone(),
            throttle,
        })
    }
}

#[async_trait]
impl TextModel for GeminiModel {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ModelError> {
        self.throttle.acquire().await;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "calling generateContent");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Request(format!("failed to read body: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }

        extract_text(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
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
    status: String,
}

/// Join the text parts of the first candidate.
fn extract_text(body: &str) -> std::result::Result<String, ModelError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Decode(e.to_string()))?;

    let content = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| ModelError::Decode("response has no candidates".into()))?;

    let text: String = content.parts.into_iter().map(|part| part.text).collect();
    if text.trim().is_empty() {
        return Err(ModelError::Decode("candidate has no text".into()));
    }
    Ok(text)
}

fn classify_failure(status: u16, body: &str) -> ModelError {
    let (message, api_status) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.status),
        Err(_) => (body.chars().take(200).collect(), String::new()),
    };

    if status == 429
        || api_status == RESOURCE_EXHAUSTED
        || message.to_lowercase().contains("quota")
    {
        ModelError::QuotaExceeded(message)
    } else {
        ModelError::Api { status, message }
    }
}
