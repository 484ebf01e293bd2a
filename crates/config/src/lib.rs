//! Configuration loading, validation, and management for Stepwright.
//!
//! Loads configuration from `~/.stepwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.stepwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// What the configured model can do
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Per-operation inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Response and action cache
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("capabilities", &self.capabilities)
            .field("inference", &self.inference)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Declared model capabilities. The adapter negotiates the tool protocol
/// from these once, at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    #[serde(default = "default_true")]
    pub supports_native_tools: bool,

    #[serde(default = "default_true")]
    pub is_vision_capable: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            supports_native_tools: true,
            is_vision_capable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Extra attempts `act` makes when the model answers without a tool call
    #[serde(default = "default_act_max_retries")]
    pub act_max_retries: u32,

    /// Temperature for act / assert / observe tool calls
    #[serde(default = "default_tool_temperature")]
    pub tool_temperature: f32,

    /// Temperature for extraction and discovery structured calls
    #[serde(default = "default_structured_temperature")]
    pub structured_temperature: f32,

    /// Upper bound on objectives returned by discovery
    #[serde(default = "default_max_objectives")]
    pub max_objectives: usize,

    /// Characters per DOM chunk when extraction runs over a whole page
    #[serde(default = "default_chunk_chars")]
    pub extract_chunk_chars: usize,
}

fn default_act_max_retries() -> u32 {
    2
}
fn default_tool_temperature() -> f32 {
    0.1
}
fn default_structured_temperature() -> f32 {
    0.1
}
fn default_max_objectives() -> usize {
    10
}
fn default_chunk_chars() -> usize {
    24_000
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            act_max_retries: default_act_max_retries(),
            tool_temperature: default_tool_temperature(),
            structured_temperature: default_structured_temperature(),
            max_objectives: default_max_objectives(),
            extract_chunk_chars: default_chunk_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "file", "sqlite", "memory", or "none"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Directory for file/sqlite backends (default: ~/.stepwright/cache)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Entries kept per partition before the oldest are evicted
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries older than this are dropped on the next write
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Request ids whose consumed keys are remembered at once
    #[serde(default = "default_max_tracked_requests")]
    pub max_tracked_requests: usize,
}

fn default_cache_backend() -> String {
    "file".into()
}
fn default_max_entries() -> usize {
    10_000
}
fn default_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}
fn default_max_tracked_requests() -> usize {
    1_024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            dir: None,
            max_entries: default_max_entries(),
            max_age_secs: default_max_age_secs(),
            max_tracked_requests: default_max_tracked_requests(),
        }
    }
}

impl CacheConfig {
    /// The cache directory, falling back to `~/.stepwright/cache`.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("cache"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwright/config.toml).
    ///
    /// Also checks environment variables:
    /// - `STEPWRIGHT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `STEPWRIGHT_MODEL`
    /// - `STEPWRIGHT_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("STEPWRIGHT_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(model) = std::env::var("STEPWRIGHT_MODEL") {
            self.default_model = model;
        }

        if let Ok(url) = std::env::var("STEPWRIGHT_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwright")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("tool_temperature", self.inference.tool_temperature),
            ("structured_temperature", self.inference.structured_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "inference.{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.inference.max_objectives == 0 {
            return Err(ConfigError::ValidationError(
                "inference.max_objectives must be at least 1".into(),
            ));
        }

        if self.inference.extract_chunk_chars < 256 {
            return Err(ConfigError::ValidationError(
                "inference.extract_chunk_chars must be at least 256".into(),
            ));
        }

        if !matches!(
            self.cache.backend.as_str(),
            "file" | "sqlite" | "memory" | "none"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "cache.backend must be one of file, sqlite, memory, none (got {})",
                self.cache.backend
            )));
        }

        if self.cache.max_entries == 0 || self.cache.max_tracked_requests == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries and cache.max_tracked_requests must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            capabilities: CapabilitiesConfig::default(),
            inference: InferenceConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inference.act_max_retries, 2);
        assert_eq!(config.cache.backend, "file");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.cache.max_entries, config.cache.max_entries);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.inference.tool_temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_cache_backend_rejected() {
        let mut config = AppConfig::default();
        config.cache.backend = "redis".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
default_model = "local-llava"

[capabilities]
supports_native_tools = false

[cache]
backend = "sqlite"
max_entries = 50
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_model, "local-llava");
        assert!(!config.capabilities.supports_native_tools);
        assert!(config.capabilities.is_vision_capable);
        assert_eq!(config.cache.backend, "sqlite");
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.max_tracked_requests, 1_024);
        assert_eq!(config.inference.act_max_retries, 2);
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inference]\nmax_objectives = 0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("act_max_retries"));
    }
}
