//! Config validation with field paths in every message.

use crate::schema::RavenConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

pub fn validate(config: &RavenConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_runtime(config, &mut report);
    validate_logging(config, &mut report);
    validate_plugins(config, &mut report);
    report
}

fn validate_runtime(config: &RavenConfig, report: &mut ValidationReport) {
    if config.runtime.event_buffer == 0 {
        report.error("runtime.event_buffer", "Event buffer must be at least 1");
    }
    if config.runtime.plugins_dir.as_os_str().is_empty() {
        report.error("runtime.plugins_dir", "Plugins directory cannot be empty");
    } else if !config.runtime.plugins_dir.is_dir() {
        report.warn(
            "runtime.plugins_dir",
            format!(
                "{} does not exist; no plugins will load",
                config.runtime.plugins_dir.display()
            ),
        );
    }
}

fn validate_logging(config: &RavenConfig, report: &mut ValidationReport) {
    let level = config.logging.level.trim();
    if level.is_empty() {
        report.error("logging.level", "Log level cannot be empty");
    } else if !level.contains('=') && !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn(
            "logging.level",
            format!("Unknown log level '{level}'; expected one of {}", LEVELS.join(", ")),
        );
    }
}

fn validate_plugins(config: &RavenConfig, report: &mut ValidationReport) {
    for (slug, settings) in &config.plugins {
        let path = format!("plugins.{slug}");
        if !settings.is_object() {
            report.error(&path, "Plugin settings must be a table");
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            report.warn(&path, "Not a valid plugin slug; these settings will never be used");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_have_no_errors() {
        let report = validate(&RavenConfig::default());
        assert!(report.is_valid());
    }

    #[test]
    fn test_zero_buffer_is_an_error() {
        let mut config = RavenConfig::default();
        config.runtime.event_buffer = 0;
        let report = validate(&config);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "runtime.event_buffer");
    }

    #[test]
    fn test_plugin_settings_must_be_tables() {
        let mut config = RavenConfig::default();
        config.plugins.insert("host".into(), json!("oops"));
        config.plugins.insert("Bad Slug".into(), json!({}));
        let report = validate(&config);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "plugins.host");
        assert!(report.warnings.iter().any(|w| w.path == "plugins.Bad Slug"));
    }

    #[test]
    fn test_filter_directives_are_accepted() {
        let mut config = RavenConfig::default();
        config.logging.level = "raven_plugins=debug,info".into();
        let report = validate(&config);
        assert!(!report.warnings.iter().any(|w| w.path == "logging.level"));

        config.logging.level = "loud".into();
        let report = validate(&config);
        assert!(report.warnings.iter().any(|w| w.path == "logging.level"));
    }
}
