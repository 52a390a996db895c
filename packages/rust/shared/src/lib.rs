//! Shared types, error model, and configuration for Grimoire.
//!
//! This crate is the foundation depended on by all other Grimoire crates.
//! It provides:
//! - [`GrimoireError`]: the unified error type
//! - Domain types ([`ProductInput`], [`EnrichmentResult`], [`ImageSource`], [`LocalImage`])
//! - Configuration ([`AppConfig`], [`RunSettings`], [`Credentials`], config loading)
//! - [`Throttle`]: per-API request-rate ceiling

pub mod config;
pub mod error;
pub mod throttle;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnsConfig, Credentials, DefaultsConfig, GeminiConfig, HttpConfig, ImagePolicy,
    RunSettings, SearchConfig, config_dir, config_file_path, init_config, init_config_at, load_config,
    load_config_from,
};
pub use error::{GrimoireError, Result};
pub use throttle::Throttle;
pub use types::{
    ACTIVE_STATUS, DOWNLOAD_FAILED_MARKER, Descriptions, EnrichmentResult, IMAGE_NOT_FOUND_MARKER,
    ImageSource, LocalImage, NO_PAGE_MARKER, PLACEHOLDER_IMAGE_URL, ProductInput,
    is_failure_marker,
};
