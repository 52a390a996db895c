//! Error types for Grimoire.
//!
//! Library crates use [`GrimoireError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Grimoire operations that can actually fail.
///
/// Per-call failures inside the enrichment pipeline never surface here; they
/// are absorbed by the component that hit them.
#[derive(Debug, thiserror::Error)]
pub enum GrimoireError {
    /// Configuration loading or validation error (including credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(String),

    /// Input table or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unsupported format, bad value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Writing the export table failed.
    #[error("export error: {0}")]
    Export(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GrimoireError>;

impl GrimoireError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = GrimoireError::config("missing GOOGLE_API_KEY");
        assert_eq!(err.to_string(), "config error: missing GOOGLE_API_KEY");

        let err = GrimoireError::validation("unsupported input format 'xlsx'");
        assert!(err.to_string().contains("xlsx"));
    }

    #[test]
    fn io_error_names_the_path() {
        let err = GrimoireError::io(
            "product_images/P1.jpg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("product_images/P1.jpg"));
    }
}
