//! Config file loading.

use crate::env::resolve_env_vars;
use crate::schema::RavenConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the config file path.
/// Priority: explicit path > `RAVEN_CONFIG` env > `./config.toml`
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("RAVEN_CONFIG") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Parse a TOML document, substituting `${VAR}` references with `env`.
pub fn parse_config(raw: &str, env: impl Fn(&Value) -> Result<Value>) -> Result<RavenConfig> {
    let tree: Value = toml::from_str(raw).context("Failed to parse config TOML")?;
    let tree = env(&tree)?;
    serde_json::from_value(tree).context("Config does not match the expected schema")
}

/// Load the config from disk, substituting process environment variables.
///
/// Returns `Ok(Default::default())` if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<RavenConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(RavenConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw, |tree| {
        resolve_env_vars(tree).context("Failed to resolve env vars in config")
    })
    .with_context(|| format!("Invalid config at: {}", path.display()))?;

    info!(path = %path.display(), plugins = config.plugins.len(), "Loaded config");
    Ok(config)
}
