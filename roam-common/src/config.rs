//! Configuration management for Roam services.
//!
//! Configuration lives in a single JSON file at `~/.roam/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (ROAM_* prefix, plus provider API keys)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ROAM_BIND` → server.bind
//! - `ROAM_PORT` → server.port
//! - `ROAM_STORAGE_MODE` → storage.mode ("local" or "sqlite")
//! - `ROAM_DATA_DIR` → storage.data_dir
//! - `ROAM_LLM_PROVIDER` → llm.provider
//! - `ROAM_LLM_MODEL` → llm.model
//! - `ROAM_LOG_LEVEL` / `ROAM_LOG_FORMAT` → observability.*
//! - `MISTRAL_API_KEY` / `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` /
//!   `GROQ_API_KEY` → llm.keys.*

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".roam"),
        |dirs| dirs.home_dir().join(".roam"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the chat API.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

const fn default_port() -> u16 {
    8000
}

// ============================================================================
// Storage
// ============================================================================

/// Which storage backend holds session state, audit turns, and the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// JSON files under the data directory.
    Local,
    /// A single SQLite database under the data directory.
    Sqlite,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Local
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,

    /// Base directory for stored data. Defaults to `./data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the data directory, falling back to `./data`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from("data"))
    }
}

// ============================================================================
// LLM
// ============================================================================

/// API keys for the supported LLM vendors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiKeysConfig {
    #[serde(default)]
    pub mistral: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
    #[serde(default)]
    pub anthropic: Option<String>,
    #[serde(default)]
    pub groq: Option<String>,
}

/// LLM provider selection and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Vendor name: "mistral", "openai", "anthropic", or "groq".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override. Each vendor adapter has a sensible default.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub keys: ApiKeysConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            keys: ApiKeysConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "mistral".into()
}

// ============================================================================
// External endpoints
// ============================================================================

/// Base URLs for the external data collaborators.
///
/// Overridable so tests can point each client at a local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_nominatim")]
    pub nominatim: String,

    #[serde(default = "default_open_meteo")]
    pub open_meteo: String,

    #[serde(default = "default_overpass")]
    pub overpass: String,

    /// Override for the LLM API base URL (all vendors).
    #[serde(default)]
    pub llm_base_url: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            nominatim: default_nominatim(),
            open_meteo: default_open_meteo(),
            overpass: default_overpass(),
            llm_base_url: None,
        }
    }
}

fn default_nominatim() -> String {
    "https://nominatim.openstreetmap.org".into()
}

fn default_open_meteo() -> String {
    "https://api.open-meteo.com".into()
}

fn default_overpass() -> String {
    "https://overpass-api.de".into()
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root config
// ============================================================================

/// Root configuration for all Roam services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, applying env overrides.
    ///
    /// A missing config file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from an explicit path, applying env overrides.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment-variable overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("ROAM_BIND") {
            self.server.bind = bind;
        }
        if let Ok(port) = std::env::var("ROAM_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(mode) = std::env::var("ROAM_STORAGE_MODE") {
            match mode.to_lowercase().as_str() {
                "local" => self.storage.mode = StorageMode::Local,
                "sqlite" => self.storage.mode = StorageMode::Sqlite,
                other => tracing::warn!("Unknown ROAM_STORAGE_MODE '{}', keeping {:?}", other, self.storage.mode),
            }
        }
        if let Ok(dir) = std::env::var("ROAM_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(provider) = std::env::var("ROAM_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("ROAM_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Ok(level) = std::env::var("ROAM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("ROAM_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        for (var, slot) in [
            ("MISTRAL_API_KEY", &mut self.llm.keys.mistral),
            ("OPENAI_API_KEY", &mut self.llm.keys.openai),
            ("ANTHROPIC_API_KEY", &mut self.llm.keys.anthropic),
            ("GROQ_API_KEY", &mut self.llm.keys.groq),
        ] {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    *slot = Some(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.mode, StorageMode::Local);
        assert_eq!(config.llm.provider, "mistral");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let json = r#"{
            "server": { "port": 9001 },
            "llm": { "provider": "anthropic" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.endpoints.nominatim, "https://nominatim.openstreetmap.org");
    }

    #[test]
    fn storage_mode_serde() {
        let mode: StorageMode = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(mode, StorageMode::Sqlite);
        assert_eq!(serde_json::to_string(&StorageMode::Local).unwrap(), "\"local\"");
    }

    #[test]
    fn data_dir_fallback() {
        let storage = StorageConfig::default();
        assert_eq!(storage.data_dir(), PathBuf::from("data"));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("nope.json")).unwrap();
        assert_eq!(config.server.port, 8000);
    }
}
