//! Raven daemon: loads configuration and plugins, boots the platform, and
//! serves until told to stop.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use raven_config::RavenConfig;
use raven_events::EventBus;
use raven_plugins::{Platform, PluginCatalog, PluginRegistry};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Load the config, applying a command-line plugins directory override.
pub async fn load_config(path: &Path, plugins_dir: Option<PathBuf>) -> Result<RavenConfig> {
    let mut config = raven_config::load_and_prepare(path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(dir) = plugins_dir {
        config.runtime.plugins_dir = dir;
    }
    Ok(config)
}

/// Entry points compiled into this binary.
pub fn catalog() -> PluginCatalog {
    raven_builtin::catalog()
}

pub fn discover(config: &RavenConfig) -> Result<PluginRegistry> {
    PluginRegistry::discover(&config.runtime.plugins_dir, &catalog()).with_context(|| {
        format!(
            "Failed to load plugins from {}",
            config.runtime.plugins_dir.display()
        )
    })
}

/// Core listener: every event on the bus goes to the event log.
pub fn spawn_event_log(bus: &EventBus) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(message) => logging::EventLogger::log_message(&message),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagged behind the bus"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Boot the platform from `registry` and serve until `shutdown` resolves.
pub async fn serve<F>(config: &RavenConfig, registry: PluginRegistry, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let bus = EventBus::with_capacity(config.runtime.event_buffer);
    let event_log = spawn_event_log(&bus);

    let platform = Platform::boot(registry, &config.plugins, bus)
        .await
        .context("Platform boot failed")?;
    info!(
        plugins = platform.runtime().manifests().len(),
        scopes = platform.scopes().paths().len(),
        "Raven daemon ready"
    );

    shutdown.await;
    info!("Shutting down");

    platform.shutdown().await;
    event_log.abort();
    Ok(())
}

/// Summary of what discovery found, printed by `ravend check`.
#[derive(Debug, Serialize)]
pub struct PluginReport {
    pub slug: String,
    pub name: String,
    pub folder: PathBuf,
    pub exports: Vec<String>,
    pub unresolved: Vec<String>,
}

pub fn check_report(registry: &PluginRegistry) -> Vec<PluginReport> {
    registry
        .plugins()
        .map(|plugin| PluginReport {
            slug: plugin.slug().to_string(),
            name: plugin.manifest.name.clone(),
            folder: plugin.folder.clone(),
            exports: plugin.exports().map(|(name, _)| name.to_string()).collect(),
            unresolved: plugin.unresolved().iter().map(ToString::to_string).collect(),
        })
        .collect()
}
