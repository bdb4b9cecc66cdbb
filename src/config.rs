//! Configuration for the synchronizer CLI.
//!
//! Loaded from a TOML file; command-line arguments override individual
//! settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: LocationSettings,

    #[serde(default)]
    pub target: LocationSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub log: LogConfig,
}

/// Settings for one location. The `dir` setting is required to construct a
/// local location; validation happens at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationSettings {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Ordered exclude patterns; a leading `!` re-includes.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
