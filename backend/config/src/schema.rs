//! Raven daemon configuration schema, as read from `config.toml`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RavenConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-plugin settings keyed by slug, handed to lifecycle acquisition.
    #[serde(default)]
    pub plugins: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Folder scanned for plugin folders.
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,

    /// Capacity of the event bus; slower subscribers lag beyond it.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rolling NDJSON logs. Console only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_event_buffer() -> usize {
    256
}

fn default_level() -> String {
    "info".to_string()
}
