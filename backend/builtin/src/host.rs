/// The `host` plugin: the machine running the daemon, as a resource.
///
/// Exercises every export kind. `config` validates the plugin settings,
/// `state` builds shared host state from it, `inventory` exposes that state,
/// `actions` mutates it and `heartbeat` announces it periodically.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use raven_core::{
    ExecArgument, ExecArgumentKind, ExecutionTarget, Executor, Resource, ResourceProperty,
    ResourcePropertyType, TargetRule,
};
use raven_events::{Emitter, EventPayload, EventScope};
use raven_plugins::{
    AsyncLifecycle, Capability, ContextValue, EventListener, ExecutionManager, Kwargs,
    LifecycleInput, Namespace, ResourceProvider, SyncLifecycle,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Catalog name referenced by the manifest's `entrypoint`.
pub const ENTRYPOINT: &str = "raven_builtin.host";

pub const RESOURCE_ID: &str = "host";
pub const CATEGORY: &str = "host";
pub const RELABEL: &str = "host.relabel";

pub fn namespace() -> Namespace {
    Namespace::new()
        .with_namespace(
            "lifecycle",
            Namespace::new()
                .with("config", Capability::sync_lifecycle(ConfigLifecycle))
                .with("state", Capability::async_lifecycle(StateLifecycle)),
        )
        .with("inventory", Capability::resource(Inventory))
        .with("actions", Capability::executor(build_actions))
        .with("heartbeat", Capability::event(Heartbeat))
}

// ---------------------------------------------------------------------------
// Lifecycle: validated settings, then shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

fn default_label() -> String {
    "raven".to_string()
}

fn default_heartbeat() -> u64 {
    30
}

impl HostSettings {
    pub fn from_value(settings: &Value) -> Result<Self> {
        let settings: Self = if settings.is_null() {
            serde_json::from_value(Value::Object(Default::default()))?
        } else {
            serde_json::from_value(settings.clone()).context("invalid host settings")?
        };
        if settings.label.trim().is_empty() {
            return Err(anyhow!("label cannot be empty"));
        }
        if settings.heartbeat_secs == 0 {
            return Err(anyhow!("heartbeat_secs must be at least 1"));
        }
        Ok(settings)
    }
}

pub struct ConfigLifecycle;

impl SyncLifecycle for ConfigLifecycle {
    fn acquire(&self, input: &LifecycleInput<'_>) -> Result<ContextValue> {
        let settings = HostSettings::from_value(input.settings)?;
        debug!(plugin = %input.plugin, label = %settings.label, "Host settings accepted");
        Ok(Arc::new(settings))
    }
}

/// Mutable host state shared by every export.
#[derive(Debug)]
pub struct HostState {
    /// Slug of the plugin that owns the state.
    pub plugin: String,
    label: RwLock<String>,
    pub started: DateTime<Utc>,
    pub heartbeat: Duration,
}

impl HostState {
    pub fn new(plugin: impl Into<String>, settings: &HostSettings) -> Self {
        Self {
            plugin: plugin.into(),
            label: RwLock::new(settings.label.clone()),
            started: Utc::now(),
            heartbeat: Duration::from_secs(settings.heartbeat_secs),
        }
    }

    pub fn label(&self) -> String {
        self.label.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn relabel(&self, label: &str) -> Result<()> {
        let mut current = self
            .label
            .write()
            .map_err(|_| anyhow!("host state is poisoned"))?;
        *current = label.to_string();
        Ok(())
    }

    pub fn resource(&self) -> Resource {
        let uptime = (Utc::now() - self.started).num_seconds().max(0);
        Resource::new(RESOURCE_ID, self.plugin.as_str(), "label")
            .with_category(CATEGORY)
            .with_tags(["builtin"])
            .with_property("label", ResourceProperty::text(self.label()).with_label("Label"))
            .with_property(
                "started",
                ResourceProperty::new(ResourcePropertyType::Datetime, self.started.to_rfc3339())
                    .with_label("Started"),
            )
            .with_property(
                "uptime",
                ResourceProperty::new(ResourcePropertyType::Number, uptime).with_label("Uptime"),
            )
    }
}

pub struct StateLifecycle;

#[async_trait]
impl AsyncLifecycle for StateLifecycle {
    async fn acquire(&self, input: &LifecycleInput<'_>) -> Result<ContextValue> {
        let settings = input
            .registry
            .get::<HostSettings>(input.plugin, "config")
            .ok_or_else(|| anyhow!("host config must be acquired before state"))?;
        let state = HostState::new(input.plugin, &settings);
        info!(plugin = %input.plugin, label = %settings.label, "Host state ready");
        Ok(Arc::new(state))
    }

    async fn release(&self, value: ContextValue) -> Result<()> {
        if let Ok(state) = value.downcast::<HostState>() {
            info!(label = %state.label(), "Host state released");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resource provider
// ---------------------------------------------------------------------------

pub struct Inventory;

#[async_trait]
impl ResourceProvider for Inventory {
    async fn resources(&self, kwargs: &Kwargs) -> Result<Vec<Resource>> {
        let state = kwargs.require_context::<HostState>("state")?;
        Ok(vec![state.resource()])
    }
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

pub struct Actions {
    export: String,
    state: Arc<HostState>,
}

fn build_actions(export: &str, kwargs: Kwargs) -> Result<Arc<dyn ExecutionManager>> {
    let state = kwargs.require_context::<HostState>("state")?;
    Ok(Arc::new(Actions {
        export: export.to_string(),
        state,
    }))
}

impl Actions {
    fn relabel(&self) -> Executor {
        let plugin = self.state.plugin.as_str();
        let mut executor = Executor::new(RELABEL, plugin, self.export.as_str(), "Relabel")
            .with_target(TargetRule::One(ExecutionTarget::category(CATEGORY)))
            .with_argument(
                ExecArgument::new(
                    "label",
                    ExecArgumentKind::String {
                        multiline: false,
                        password: false,
                        suggestions: None,
                    },
                )
                .required(),
            );
        executor.description = Some("Change the host's display label".into());
        executor
    }
}

#[async_trait]
impl ExecutionManager for Actions {
    async fn executors(&self, _targets: &[Resource]) -> Result<Vec<Executor>> {
        Ok(vec![self.relabel()])
    }

    async fn available_targets(&self, _executor: &Executor) -> Result<Vec<Resource>> {
        Ok(vec![self.state.resource()])
    }

    async fn execute(
        &self,
        executor: &Executor,
        arguments: &IndexMap<String, Value>,
        _target: Option<&Resource>,
    ) -> Result<Option<Resource>> {
        if executor.id != RELABEL {
            return Err(anyhow!("unknown host action '{}'", executor.id));
        }
        let label = arguments
            .get("label")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| anyhow!("label must be a non-empty string"))?;
        self.state.relabel(label)?;
        info!(label = %label, "Host relabelled");
        Ok(Some(self.state.resource()))
    }
}

// ---------------------------------------------------------------------------
// Event listener
// ---------------------------------------------------------------------------

pub struct Heartbeat;

#[async_trait]
impl EventListener for Heartbeat {
    async fn listen(&self, emit: Emitter, kwargs: Kwargs) -> Result<()> {
        let state = kwargs.require_context::<HostState>("state")?;
        let entity = kwargs.literal("entity").unwrap_or(RESOURCE_ID).to_string();
        let mut ticker = tokio::time::interval(state.heartbeat);
        loop {
            ticker.tick().await;
            emit.emit_payload(
                EventPayload::ResourceUpdate {
                    entity_id: entity.clone(),
                },
                EventScope::Global,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_events::{Event, EventBus};
    use raven_plugins::{Platform, PluginRegistry};
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;

    fn manifest_path() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plugins/host/manifest.json")
    }

    fn install(root: &Path) {
        let dir = root.join("host");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::copy(manifest_path(), dir.join("manifest.json")).unwrap();
    }

    async fn boot(settings: Value) -> (tempfile::TempDir, Platform) {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let registry = PluginRegistry::discover(dir.path(), &crate::catalog()).unwrap();
        let settings = HashMap::from([("host".to_string(), settings)]);
        let platform = Platform::boot(registry, &settings, EventBus::new()).await.unwrap();
        (dir, platform)
    }

    #[test]
    fn test_settings_defaults_and_validation() {
        let defaults = HostSettings::from_value(&Value::Null).unwrap();
        assert_eq!(defaults.label, "raven");
        assert_eq!(defaults.heartbeat_secs, 30);
        assert!(HostSettings::from_value(&json!({"heartbeat_secs": 0})).is_err());
        assert!(HostSettings::from_value(&json!({"label": "  "})).is_err());
        assert!(HostSettings::from_value(&json!({"heartbeat_secs": "soon"})).is_err());
    }

    #[tokio::test]
    async fn test_manifest_binds_every_export() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let registry = PluginRegistry::discover(dir.path(), &crate::catalog()).unwrap();
        let host = registry.get("host").unwrap();
        assert!(host.unresolved().is_empty());
        assert_eq!(host.exports().count(), 5);
        assert_eq!(host.folder, dir.path().join("host"));
    }

    #[tokio::test]
    async fn test_relabel_round_trip() {
        let (_dir, platform) = boot(json!({"label": "rack-1", "heartbeat_secs": 60})).await;
        let runtime = platform.runtime();

        let resources = runtime.get_resources().await;
        assert!(resources.is_complete());
        let host = resources.items[0].clone();
        assert_eq!(host.state().unwrap().value, json!("rack-1"));

        let executors = runtime.get_executors_for_resources(&[host.clone()]).await.items;
        assert_eq!(executors.len(), 1);
        let relabel = &executors[0];
        assert_eq!(relabel.id, RELABEL);

        let args = IndexMap::from([("label".to_string(), json!("rack-2"))]);
        let updated = runtime
            .call_executor(relabel, &args, Some(&host))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.state().unwrap().value, json!("rack-2"));

        let again = runtime.get_resources().await.items;
        assert_eq!(again[0].state().unwrap().value, json!("rack-2"));

        assert!(runtime.call_executor(relabel, &IndexMap::new(), Some(&host)).await.is_err());
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_heartbeat_announces_host() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let registry = PluginRegistry::discover(dir.path(), &crate::catalog()).unwrap();
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let settings = HashMap::from([("host".to_string(), json!({"heartbeat_secs": 1}))]);
        let platform = Platform::boot(registry, &settings, bus).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let event = Event::decode(&message).unwrap();
        assert_eq!(event.source, "host:heartbeat");
        assert_eq!(
            event.payload,
            EventPayload::ResourceUpdate {
                entity_id: "host".into()
            }
        );
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_settings_abort_boot() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        let registry = PluginRegistry::discover(dir.path(), &crate::catalog()).unwrap();
        let settings = HashMap::from([("host".to_string(), json!({"heartbeat_secs": 0}))]);
        let err = Platform::boot(registry, &settings, EventBus::new()).await.err().unwrap();
        assert!(err.to_string().contains("host.config"));
    }

    #[tokio::test]
    async fn test_resources_carry_installed_slug() {
        let dir = tempfile::tempdir().unwrap();
        let raw = std::fs::read_to_string(manifest_path()).unwrap();
        let renamed = raw.replacen("\"slug\": \"host\"", "\"slug\": \"lab\"", 1);
        assert_ne!(raw, renamed);
        let folder = dir.path().join("lab");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("manifest.json"), renamed).unwrap();

        let registry = PluginRegistry::discover(dir.path(), &crate::catalog()).unwrap();
        let platform = Platform::boot(registry, &HashMap::new(), EventBus::new()).await.unwrap();
        let runtime = platform.runtime();

        let host = runtime.get_resources().await.items.remove(0);
        assert_eq!(host.plugin, "lab");
        let executors = runtime.get_executors_for_resources(&[host]).await.items;
        assert_eq!(executors[0].plugin, "lab");
        platform.shutdown().await;
    }
}
