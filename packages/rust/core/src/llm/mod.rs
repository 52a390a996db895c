//! Generative text models.
//!
//! [`TextModel`] is the seam between description generation and a concrete
//! provider. [`GeminiModel`] talks to the Google Generative Language API.

mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiModel;

/// Failure of a single completion call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// The provider refused the call because a quota or rate limit was hit.
    #[error("model quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("model request failed: {0}")]
    Request(String),

    /// Non-success HTTP status other than a quota rejection.
    #[error("model API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response carried no usable text.
    #[error("model response could not be decoded: {0}")]
    Decode(String),
}

impl ModelError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

/// A text model that turns one prompt into one completion.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Complete `prompt`, returning the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Model identifier for tracing.
    fn name(&self) -> &str;
}
