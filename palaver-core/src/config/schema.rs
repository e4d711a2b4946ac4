//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for palaver
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    dirs::home_dir()
        .map(|h| h.join(".palaver").join("palaver.db"))
        .unwrap_or_else(|| PathBuf::from(".palaver/palaver.db"))
        .to_string_lossy()
        .to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the completion endpoint
    #[serde(default)]
    pub api_key: String,
    /// Base URL of the chat-completions API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for one completion round-trip, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_model() -> String {
    "mistral-tiny".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
