//! Configuration loading for the newscast services
//!
//! Resolution priority order:
//! 1. Explicit path passed by the caller (highest priority)
//! 2. `NEWSCAST_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/newscast/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Individual fields can additionally be overridden through environment
//! variables (`NEWSCAST_BIND`, `NEWSCAST_DB`, `NEWSCAST_SYNONYM_URL`,
//! `NEWSCAST_REGISTRY_URL`, `NEWSCAST_COMPLETION_URL`).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Text-completion service settings
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the chat-completion endpoint
    #[serde(default = "default_completion_url")]
    pub url: String,
    /// Model identifier sent with each request
    #[serde(default = "default_completion_model")]
    pub model: String,
    /// Optional bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            api_key: None,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen address for the HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// SQLite database file path
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Base URL of the external lexical (synonym) service
    #[serde(default = "default_synonym_url")]
    pub synonym_url: String,
    /// Base URL of the phase registry service
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// Sustained synonym lookups allowed per second
    #[serde(default = "default_synonym_rate")]
    pub synonym_rate_per_sec: u32,
    /// Concurrent in-flight lookups within one synonym batch
    #[serde(default = "default_synonym_concurrency")]
    pub synonym_concurrency: usize,
    /// Timeout applied to each channel delivery attempt, in seconds
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
    /// Text-completion service settings
    #[serde(default)]
    pub completion: CompletionConfig,
}

fn default_bind() -> String {
    "127.0.0.1:5890".to_string()
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("newscast").join("newscast.db"))
        .unwrap_or_else(|| PathBuf::from("./newscast.db"))
}

fn default_synonym_url() -> String {
    "http://127.0.0.1:5891".to_string()
}

fn default_registry_url() -> String {
    "http://127.0.0.1:5892".to_string()
}

fn default_completion_url() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_completion_model() -> String {
    "local-model".to_string()
}

fn default_synonym_rate() -> u32 {
    50
}

fn default_synonym_concurrency() -> usize {
    8
}

fn default_delivery_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        // Safe: an empty TOML document deserializes using the field defaults
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load configuration following the priority order described in the
    /// module docs.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit_path) {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading configuration file");
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn locate(explicit_path: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: explicit path
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var("NEWSCAST_CONFIG") {
            return Some(PathBuf::from(path));
        }

        // Priority 3: platform config directory
        let candidate = dirs::config_dir().map(|d| d.join("newscast").join("config.toml"))?;
        candidate.exists().then_some(candidate)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("NEWSCAST_BIND") {
            self.bind = bind;
        }
        if let Ok(db) = std::env::var("NEWSCAST_DB") {
            self.database_path = PathBuf::from(db);
        }
        if let Ok(url) = std::env::var("NEWSCAST_SYNONYM_URL") {
            self.synonym_url = url;
        }
        if let Ok(url) = std::env::var("NEWSCAST_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Ok(url) = std::env::var("NEWSCAST_COMPLETION_URL") {
            self.completion.url = url;
        }
    }
}
