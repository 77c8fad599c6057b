//! Application settings.
//!
//! Configuration is loaded from (in order of precedence):
//!   1. Environment variables (`OPENSIFT_` prefix, `__` for nesting)
//!   2. YAML config file (`--config` flag, or `opensift.yaml` in the CWD)
//!   3. Default values

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiftError};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads (0 = tokio default)
    #[serde(default)]
    pub workers: usize,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Allowed CORS origins; `["*"]` allows any origin
    #[serde(default = "default_cors")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cors() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
            request_timeout: default_request_timeout(),
            cors_origins: default_cors(),
        }
    }
}

/// LLM gateway configuration.
///
/// One OpenAI-compatible endpoint serves both core tasks:
///   1. Query planning - generating search queries and screening criteria
///   2. Result verification - validating results against criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    /// API key; when empty the planner and verifier fall back to heuristics
    #[serde(default)]
    pub api_key: String,
    /// Model used for query planning / criteria generation
    #[serde(default = "default_model")]
    pub model_planner: String,
    /// Model used for result verification
    #[serde(default = "default_model")]
    pub model_verifier: String,
    /// OpenAI-compatible API endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum tokens per LLM call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.1
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_planner: default_model(),
            model_verifier: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Configuration for a single search adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Whether this adapter is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Backend host URLs
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Index/collection pattern
    #[serde(default = "default_index_pattern")]
    pub index_pattern: String,
    /// Authentication username
    #[serde(default)]
    pub username: Option<String>,
    /// Authentication password
    #[serde(default)]
    pub password: Option<String>,
    /// API key authentication
    #[serde(default)]
    pub api_key: Option<String>,
    /// Adapter-specific options
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

fn default_index_pattern() -> String {
    "*".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hosts: Vec::new(),
            index_pattern: default_index_pattern(),
            username: None,
            password: None,
            api_key: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Search behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Default search adapter name
    #[serde(default = "default_adapter")]
    pub default_adapter: String,
    /// Adapter configurations keyed by adapter name
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterConfig>,
    /// Max concurrent verification calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_queries: usize,
}

fn default_adapter() -> String {
    "openalex".to_string()
}

fn default_max_concurrent() -> usize {
    10
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_adapter: default_adapter(),
            adapters: BTreeMap::new(),
            max_concurrent_queries: default_max_concurrent(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format: json, console
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Root application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// Load settings from an optional YAML file, then apply environment
    /// overrides.
    ///
    /// When `path` is `None`, `opensift.yaml` in the working directory is
    /// used if present. A path that was explicitly given but does not exist,
    /// or a file that fails to parse, is a fatal `Validation` error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(SiftError::Validation(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                Self::from_yaml(p)?
            }
            None => {
                let default_path = Path::new("opensift.yaml");
                if default_path.exists() {
                    Self::from_yaml(default_path)?
                } else {
                    Settings::default()
                }
            }
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// Parse a YAML config file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SiftError::Validation(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            SiftError::Validation(format!("Invalid config file {}: {e}", path.display()))
        })
    }

    /// Apply `OPENSIFT_SECTION__KEY` environment variable overrides.
    ///
    /// Only scalar settings can be overridden from the environment; adapter
    /// maps and CORS lists come from the YAML file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_str("OPENSIFT_SERVER__HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parse::<u16>("OPENSIFT_SERVER__PORT")? {
            self.server.port = v;
        }
        if let Some(v) = env_parse::<usize>("OPENSIFT_SERVER__WORKERS")? {
            self.server.workers = v;
        }
        if let Some(v) = env_parse::<u64>("OPENSIFT_SERVER__REQUEST_TIMEOUT")? {
            self.server.request_timeout = v;
        }
        if let Some(v) = env_str("OPENSIFT_AI__API_KEY") {
            self.ai.api_key = v;
        }
        if let Some(v) = env_str("OPENSIFT_AI__BASE_URL") {
            self.ai.base_url = v;
        }
        if let Some(v) = env_str("OPENSIFT_AI__MODEL_PLANNER") {
            self.ai.model_planner = v;
        }
        if let Some(v) = env_str("OPENSIFT_AI__MODEL_VERIFIER") {
            self.ai.model_verifier = v;
        }
        if let Some(v) = env_parse::<u32>("OPENSIFT_AI__MAX_TOKENS")? {
            self.ai.max_tokens = v;
        }
        if let Some(v) = env_parse::<f64>("OPENSIFT_AI__TEMPERATURE")? {
            self.ai.temperature = v;
        }
        if let Some(v) = env_str("OPENSIFT_SEARCH__DEFAULT_ADAPTER") {
            self.search.default_adapter = v;
        }
        if let Some(v) = env_parse::<usize>("OPENSIFT_SEARCH__MAX_CONCURRENT_QUERIES")? {
            self.search.max_concurrent_queries = v;
        }
        if let Some(v) = env_str("OPENSIFT_OBSERVABILITY__LOG_LEVEL") {
            self.observability.log_level = v;
        }
        if let Some(v) = env_str("OPENSIFT_OBSERVABILITY__LOG_FORMAT") {
            self.observability.log_format = v;
        }
        Ok(())
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_str(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| SiftError::Validation(format!("Invalid value for {key}: {raw:?}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.ai.max_tokens, 4096);
        assert_eq!(s.ai.temperature, 0.1);
        assert_eq!(s.search.max_concurrent_queries, 10);
        assert_eq!(s.search.default_adapter, "openalex");
        assert!(s.search.adapters.is_empty());
        assert_eq!(s.observability.log_format, "console");
    }

    #[test]
    fn test_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"
server:
  port: 9090
ai:
  api_key: sk-test-123
  model_planner: planner-x
search:
  default_adapter: wikipedia
  adapters:
    wikipedia:
      enabled: true
      index_pattern: en
    meilisearch:
      enabled: false
      hosts: ["http://localhost:7700"]
      api_key: master
"#
        )
        .expect("write yaml");

        let s = Settings::from_yaml(file.path()).expect("parse");
        assert_eq!(s.server.port, 9090);
        assert_eq!(s.ai.api_key, "sk-test-123");
        assert_eq!(s.ai.model_planner, "planner-x");
        assert_eq!(s.search.default_adapter, "wikipedia");
        assert_eq!(s.search.adapters.len(), 2);
        let meili = &s.search.adapters["meilisearch"];
        assert!(!meili.enabled);
        assert_eq!(meili.hosts, vec!["http://localhost:7700"]);
        assert_eq!(meili.api_key.as_deref(), Some("master"));
    }

    #[test]
    fn test_invalid_yaml_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "server: [not, a, map]").expect("write yaml");
        let err = Settings::from_yaml(file.path()).expect_err("should fail");
        assert!(matches!(err, SiftError::Validation(_)));
    }

    #[test]
    fn test_missing_explicit_config_is_fatal() {
        let err = Settings::load(Some(Path::new("/nonexistent/opensift.yaml")))
            .expect_err("should fail");
        assert!(matches!(err, SiftError::Validation(_)));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("OPENSIFT_SERVER__PORT", "7070");
        std::env::set_var("OPENSIFT_AI__API_KEY", "sk-env");
        let mut s = Settings::default();
        s.apply_env_overrides().expect("overrides");
        assert_eq!(s.server.port, 7070);
        assert_eq!(s.ai.api_key, "sk-env");
        std::env::remove_var("OPENSIFT_SERVER__PORT");
        std::env::remove_var("OPENSIFT_AI__API_KEY");
    }

    #[test]
    fn test_env_override_bad_value() {
        std::env::set_var("OPENSIFT_SERVER__REQUEST_TIMEOUT", "soon");
        let mut s = Settings::default();
        let err = s.apply_env_overrides().expect_err("should fail");
        assert!(matches!(err, SiftError::Validation(_)));
        std::env::remove_var("OPENSIFT_SERVER__REQUEST_TIMEOUT");
    }
}
