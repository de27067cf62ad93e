//! `raven-config`: daemon configuration.
//!
//! Provides:
//! - Typed TOML schema (runtime, logging, per-plugin settings)
//! - `${ENV_VAR}` substitution
//! - Validation with errors and warnings

pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_file_path, load_config, parse_config};
pub use schema::{LoggingConfig, RavenConfig, RuntimeConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load, substitute and validate a config file.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<RavenConfig> {
    let config = load_config(path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        bail!("{} ({} error(s) in total)", first, report.errors.len());
    }

    Ok(config)
}
