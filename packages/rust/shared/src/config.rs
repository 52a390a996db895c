//! Application configuration for Grimoire.
//!
//! User config lives at `~/.grimoire/grimoire.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GrimoireError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "grimoire.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".grimoire";

// ---------------------------------------------------------------------------
// Config structs (matching grimoire.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Input table column mapping.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Web/image search API settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Generative text API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Outbound HTTP settings for page scraping and image download.
    #[serde(default)]
    pub http: HttpConfig,

    /// Image candidate selection policy.
    #[serde(default)]
    pub image_policy: ImagePolicy,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory downloaded images are written to.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// Export file written at the end of a run.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Number of products enriched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            output_file: default_output_file(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_image_dir() -> String {
    "product_images".into()
}
fn default_output_file() -> String {
    "enriched_products.csv".into()
}
fn default_concurrency() -> u32 {
    4
}

/// `[columns]` section: which input columns hold which product field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_sku_column")]
    pub sku: String,
    #[serde(default = "default_name_column")]
    pub name: String,
    #[serde(default = "default_quantity_column")]
    pub quantity: String,
    #[serde(default = "default_price_column")]
    pub price: String,
    /// Field delimiter of the input table.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            sku: default_sku_column(),
            name: default_name_column(),
            quantity: default_quantity_column(),
            price: default_price_column(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_sku_column() -> String {
    "SKU".into()
}
fn default_name_column() -> String {
    "NAME".into()
}
fn default_quantity_column() -> String {
    "QUANTITY".into()
}
fn default_price_column() -> String {
    "PRICE".into()
}
fn default_delimiter() -> char {
    ';'
}

/// `[search]` section (Google Custom Search JSON API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the search engine id (`cx`).
    #[serde(default = "default_engine_id_env")]
    pub engine_id_env: String,

    /// API origin, overridable for tests and proxies.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Request ceiling shared by page and image searches.
    #[serde(default = "default_search_rpm")]
    pub requests_per_minute: u32,

    /// Timeout for a single search call.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            engine_id_env: default_engine_id_env(),
            base_url: default_search_base_url(),
            requests_per_minute: default_search_rpm(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_engine_id_env() -> String {
    "GOOGLE_CSE_ID".into()
}
fn default_search_base_url() -> String {
    "https://www.googleapis.com".into()
}
fn default_search_rpm() -> u32 {
    60
}
fn default_search_timeout_secs() -> u64 {
    15
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used for description generation.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API origin, overridable for tests and proxies.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_rpm")]
    pub requests_per_minute: u32,

    /// Timeout for a single generation call; generation is much slower than a page fetch.
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            requests_per_minute: default_gemini_rpm(),
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_gemini_rpm() -> u32 {
    15
}
fn default_gemini_timeout_secs() -> u64 {
    60
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for page fetches and image downloads.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Browser-like User-Agent; some shops refuse unknown clients.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .into()
}

/// `[image_policy]` section: tunable heuristics for picking among generic
/// `<img>` candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePolicy {
    /// Candidates whose URL contains any of these (case-insensitive) are dropped.
    #[serde(default = "default_blocked_tokens")]
    pub blocked_tokens: Vec<String>,

    /// Candidates containing any of these win over document order.
    #[serde(default = "default_preferred_tokens")]
    pub preferred_tokens: Vec<String>,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            blocked_tokens: default_blocked_tokens(),
            preferred_tokens: default_preferred_tokens(),
        }
    }
}

fn default_blocked_tokens() -> Vec<String> {
    ["logo", "icon", "avatar", "spinner", ".svg", ".gif", "base64"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_preferred_tokens() -> Vec<String> {
    vec!["zoom".into(), "large".into()]
}

impl ImagePolicy {
    /// Whether a candidate URL contains a blocked token.
    pub fn is_blocked(&self, candidate: &str) -> bool {
        let lower = candidate.to_lowercase();
        self.blocked_tokens
            .iter()
            .any(|token| lower.contains(&token.to_lowercase()))
    }

    /// Whether a candidate URL contains a preferred token.
    pub fn is_preferred(&self, candidate: &str) -> bool {
        let lower = candidate.to_lowercase();
        self.preferred_tokens
            .iter()
            .any(|token| lower.contains(&token.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Run settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for one batch run: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub image_dir: PathBuf,
    pub output_file: PathBuf,
    /// Worker pool size, at least 1.
    pub concurrency: usize,
}

impl From<&AppConfig> for RunSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            image_dir: PathBuf::from(&config.defaults.image_dir),
            output_file: PathBuf::from(&config.defaults.output_file),
            concurrency: config.defaults.concurrency.max(1) as usize,
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API credentials resolved from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub search_api_key: String,
    pub search_engine_id: String,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("search_api_key", &"<redacted>")
            .field("search_engine_id", &self.search_engine_id)
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve every credential from the process environment.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve every credential through `lookup` (env var name → value).
    ///
    /// Fails on the first variable that is unset or blank.
    pub fn from_lookup(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |var_name: &str, what: &str| -> Result<String> {
            match lookup(var_name) {
                Some(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
                _ => Err(GrimoireError::config(format!(
                    "{what} not found. Set the {var_name} environment variable."
                ))),
            }
        };

        Ok(Self {
            search_api_key: require(&config.search.api_key_env, "Search API key")?,
            search_engine_id: require(&config.search.engine_id_env, "Search engine id")?,
            gemini_api_key: require(&config.gemini.api_key_env, "Gemini API key")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.grimoire/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| GrimoireError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.grimoire/grimoire.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GrimoireError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GrimoireError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| GrimoireError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GrimoireError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| GrimoireError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("image_dir"));
        assert!(toml_str.contains("GOOGLE_API_KEY"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.columns.delimiter, ';');
        assert_eq!(parsed.gemini.model, "gemini-1.5-flash");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[columns]
sku = "CODIGO"
name = "DESCRICAO_CODIGO"

[image_policy]
preferred_tokens = ["hires"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.columns.sku, "CODIGO");
        assert_eq!(config.columns.price, "PRICE");
        assert_eq!(config.image_policy.preferred_tokens, vec!["hires"]);
        assert!(config.image_policy.blocked_tokens.contains(&"logo".to_string()));
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.search.timeout_secs, 15);
        assert_eq!(config.gemini.timeout_secs, 60);
    }

    #[test]
    fn run_settings_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.concurrency = 0;
        let run = RunSettings::from(&app);
        assert_eq!(run.concurrency, 1);
        assert_eq!(run.image_dir, PathBuf::from("product_images"));
    }

    #[test]
    fn image_policy_matching_is_case_insensitive() {
        let policy = ImagePolicy::default();
        assert!(policy.is_blocked("https://shop.test/static/LOGO-header.png"));
        assert!(policy.is_blocked("https://shop.test/anim.GIF"));
        assert!(!policy.is_blocked("https://shop.test/p/widget.jpg"));
        assert!(policy.is_preferred("https://shop.test/p/widget_Large.jpg"));
    }

    #[test]
    fn credentials_resolve_from_lookup() {
        let config = AppConfig::default();
        let creds = Credentials::from_lookup(&config, |name| match name {
            "GOOGLE_API_KEY" => Some("g-key".into()),
            "GOOGLE_CSE_ID" => Some(" cx-1 ".into()),
            "GEMINI_API_KEY" => Some("m-key".into()),
            _ => None,
        })
        .expect("credentials");
        assert_eq!(creds.search_engine_id, "cx-1");
        assert!(!format!("{creds:?}").contains("g-key"));
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let config = AppConfig::default();
        let err = Credentials::from_lookup(&config, |name| match name {
            "GOOGLE_API_KEY" => Some("g-key".into()),
            "GOOGLE_CSE_ID" => Some("cx".into()),
            _ => Some("   ".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(matches!(err, GrimoireError::Config { .. }));
    }

    #[test]
    fn init_config_at_writes_loadable_defaults() {
        let dir = std::env::temp_dir().join(format!("grimoire-config-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("grimoire.toml");

        let written = init_config_at(&path).unwrap();
        assert_eq!(written, path);

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.columns.delimiter, ';');
        assert_eq!(loaded.gemini.model, "gemini-1.5-flash");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
