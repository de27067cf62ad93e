//! Plugin runtime: gathers resources and executors across loaded plugins,
//! routes executor calls, and starts event listeners.
//!
//! Gathering runs one future per plugin, joined as a unit. A failing export
//! never takes down its siblings: its error, or its panic, lands in
//! [`Gathered::failures`] and the batch completes with partial results.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use indexmap::IndexMap;
use raven_core::{Executor, RavenError, RavenResult, Resource};
use raven_events::{Emitter, EventBus};
use raven_security::User;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::lifecycle::LifecycleRegistry;
use crate::manifest::{KwargValue, KwargsExport, PluginManifest};
use crate::registry::{Plugin, PluginRegistry};
use crate::resolver::ResolvedExport;
use crate::sdk::{ExecutionManager, KwargArg, Kwargs};

/// Grants visibility of every plugin's resources.
pub const ALL_RESOURCES_SCOPE: &str = "resources.all.*";

/// Partial results of a fan-out plus the errors of the exports that failed.
#[derive(Debug)]
pub struct Gathered<T> {
    pub items: Vec<T>,
    pub failures: Vec<RavenError>,
}

impl<T> Default for Gathered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Gathered<T> {
    fn merge(mut self, other: Gathered<T>) -> Self {
        self.items.extend(other.items);
        self.failures.extend(other.failures);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolve declared kwargs; context references read `plugin`'s own entries.
pub fn bind_kwargs(plugin: &str, declaration: &KwargsExport, context: &LifecycleRegistry) -> Kwargs {
    let mut kwargs = Kwargs::new();
    for (name, value) in &declaration.kwargs {
        let arg = match value {
            KwargValue::Literal(literal) => KwargArg::Literal(literal.clone()),
            KwargValue::Context { context: key } => {
                let value = context.get_raw(plugin, key);
                if value.is_none() {
                    warn!(plugin = %plugin, kwarg = %name, key = %key, "Context key not registered");
                }
                KwargArg::Context(value)
            }
        };
        kwargs.insert(name.clone(), arg);
    }
    kwargs
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Await plugin code, turning a panic into an error.
async fn contained<T>(work: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!("plugin panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn execution_failure(plugin: &str, export: &str, source: anyhow::Error) -> RavenError {
    RavenError::PluginExecution {
        plugin: plugin.to_string(),
        export: export.to_string(),
        source,
    }
}

struct BoundManager {
    plugin: String,
    export: String,
    manager: Arc<dyn ExecutionManager>,
}

impl BoundManager {
    fn stamp(&self, mut executor: Executor) -> Executor {
        executor.plugin = self.plugin.clone();
        executor.export = self.export.clone();
        executor
    }
}

/// Loaded plugins bound to the acquired lifecycle context.
pub struct PluginRuntime {
    registry: PluginRegistry,
    context: Arc<LifecycleRegistry>,
    managers: Vec<BoundManager>,
    unavailable: Vec<RavenError>,
}

impl PluginRuntime {
    /// Build one execution manager per executor export. A factory failure
    /// disables that export only.
    pub fn new(registry: PluginRegistry, context: Arc<LifecycleRegistry>) -> Self {
        let mut managers = Vec::new();
        let mut unavailable = Vec::new();

        for plugin in registry.plugins() {
            for (export, resolved) in plugin.exports() {
                let ResolvedExport::Executor { declaration, factory } = resolved else {
                    continue;
                };
                let kwargs = bind_kwargs(plugin.slug(), declaration, &context);
                match factory.build(export, kwargs) {
                    Ok(manager) => managers.push(BoundManager {
                        plugin: plugin.slug().to_string(),
                        export: export.to_string(),
                        manager,
                    }),
                    Err(e) => {
                        error!(plugin = %plugin.slug(), export = %export, error = %e, "Execution manager unavailable");
                        unavailable.push(execution_failure(plugin.slug(), export, e));
                    }
                }
            }
        }

        Self {
            registry,
            context,
            managers,
            unavailable,
        }
    }

    pub fn context(&self) -> &LifecycleRegistry {
        &self.context
    }

    pub fn plugin(&self, slug: &str) -> Option<&Plugin> {
        self.registry.get(slug)
    }

    pub fn manifests(&self) -> Vec<&PluginManifest> {
        self.registry.manifests()
    }

    /// Executor exports whose manager could not be built.
    pub fn unavailable(&self) -> &[RavenError] {
        &self.unavailable
    }

    /// Every resource of every plugin.
    pub async fn get_resources(&self) -> Gathered<Resource> {
        self.gather_resources(self.registry.plugins().collect()).await
    }

    /// Resources of the plugins `user` may see: everything with
    /// `resources.all.*`, otherwise plugins granted through
    /// `resources.plugin.<slug>.*`.
    pub async fn resources_for(&self, user: &User) -> Gathered<Resource> {
        if user.has_scope(&[ALL_RESOURCES_SCOPE]) {
            return self.get_resources().await;
        }
        let visible = self
            .registry
            .plugins()
            .filter(|plugin| user.has_scope(&[format!("resources.plugin.{}.*", plugin.slug())]))
            .collect();
        self.gather_resources(visible).await
    }

    async fn gather_resources(&self, plugins: Vec<&Plugin>) -> Gathered<Resource> {
        let tasks = plugins.into_iter().map(|plugin| self.plugin_resources(plugin));
        let gathered = join_all(tasks)
            .await
            .into_iter()
            .fold(Gathered::default(), Gathered::merge);
        debug!(
            resources = gathered.items.len(),
            failures = gathered.failures.len(),
            "Gathered resources"
        );
        gathered
    }

    async fn plugin_resources(&self, plugin: &Plugin) -> Gathered<Resource> {
        let mut gathered = Gathered::default();
        for (export, resolved) in plugin.exports() {
            let ResolvedExport::Resource { declaration, provider } = resolved else {
                continue;
            };
            let kwargs = bind_kwargs(plugin.slug(), declaration, &self.context);
            match contained(provider.resources(&kwargs)).await {
                Ok(resources) => gathered.items.extend(resources),
                Err(e) => {
                    error!(plugin = %plugin.slug(), export = %export, error = %e, "Resource provider failed");
                    gathered.failures.push(execution_failure(plugin.slug(), export, e));
                }
            }
        }
        gathered
    }

    /// Executors offered for `targets`, stamped with their owning plugin and
    /// export. With non-empty `targets`, executors matching none of them are
    /// discarded.
    pub async fn get_executors_for_resources(&self, targets: &[Resource]) -> Gathered<Executor> {
        let tasks = self.managers.iter().map(|bound| async move {
            match contained(bound.manager.executors(targets)).await {
                Ok(executors) => Gathered {
                    items: executors
                        .into_iter()
                        .map(|executor| bound.stamp(executor))
                        .filter(|executor| {
                            targets.is_empty() || targets.iter().any(|t| executor.matches_resource(t))
                        })
                        .collect(),
                    failures: Vec::new(),
                },
                Err(e) => {
                    error!(plugin = %bound.plugin, export = %bound.export, error = %e, "Execution manager failed");
                    Gathered {
                        items: Vec::new(),
                        failures: vec![execution_failure(&bound.plugin, &bound.export, e)],
                    }
                }
            }
        });
        join_all(tasks)
            .await
            .into_iter()
            .fold(Gathered::default(), Gathered::merge)
    }

    /// The manager's own definition of `requested`. Callers only supply the
    /// `plugin`/`export`/`id` coordinates; targets and argument schema always
    /// come from the manager.
    async fn definition(
        &self,
        requested: &Executor,
        targets: &[Resource],
    ) -> RavenResult<(&BoundManager, Executor)> {
        let unknown = || RavenError::UnknownExecutor {
            plugin: requested.plugin.clone(),
            export: requested.export.clone(),
            executor: requested.id.clone(),
        };
        let bound = self
            .managers
            .iter()
            .find(|bound| bound.plugin == requested.plugin && bound.export == requested.export)
            .ok_or_else(unknown)?;
        let offered = contained(bound.manager.executors(targets))
            .await
            .map_err(|e| execution_failure(&bound.plugin, &bound.export, e))?;
        let executor = offered
            .into_iter()
            .find(|executor| executor.id == requested.id)
            .ok_or_else(unknown)?;
        Ok((bound, bound.stamp(executor)))
    }

    /// Resources `executor` can act on, as reported by its manager and
    /// filtered through the executor's own target rules.
    pub async fn executor_targets(&self, executor: &Executor) -> RavenResult<Vec<Resource>> {
        let (bound, executor) = self.definition(executor, &[]).await?;
        let resources = contained(bound.manager.available_targets(&executor))
            .await
            .map_err(|e| execution_failure(&bound.plugin, &bound.export, e))?;
        Ok(resources
            .into_iter()
            .filter(|resource| executor.matches_resource(resource))
            .collect())
    }

    /// Run `executor` against `target`.
    pub async fn call_executor(
        &self,
        executor: &Executor,
        arguments: &IndexMap<String, Value>,
        target: Option<&Resource>,
    ) -> RavenResult<Option<Resource>> {
        let targets = target.map(std::slice::from_ref).unwrap_or_default();
        let (bound, executor) = self.definition(executor, targets).await?;
        if let Some(resource) = target {
            if !executor.matches_resource(resource) {
                return Err(RavenError::TargetMismatch {
                    executor: executor.id.clone(),
                    resource: resource.id.clone(),
                });
            }
        }
        executor
            .validate_arguments(arguments)
            .map_err(|message| RavenError::InvalidArguments {
                executor: executor.id.clone(),
                message,
            })?;

        info!(executor = %executor.id, plugin = %bound.plugin, resource = ?target.map(|r| &r.id), "Calling executor");
        contained(bound.manager.execute(&executor, arguments, target))
            .await
            .map_err(|e| {
                error!(executor = %executor.id, error = %e, "Executor failed");
                execution_failure(&bound.plugin, &bound.export, e)
            })
    }

    /// Spawn one background task per event export.
    pub fn activate_listeners(&self, bus: &EventBus) -> ListenerSet {
        let mut tasks = Vec::new();
        for plugin in self.registry.plugins() {
            for (export, resolved) in plugin.exports() {
                let ResolvedExport::Event { declaration, listener } = resolved else {
                    continue;
                };
                let emit = Emitter::for_export(bus.clone(), plugin.slug(), export);
                let source = emit.source().to_string();
                let kwargs = bind_kwargs(plugin.slug(), declaration, &self.context);
                let listener = listener.clone();
                let task_source = source.clone();
                let handle = tokio::spawn(async move {
                    match listener.listen(emit, kwargs).await {
                        Ok(()) => info!(source = %task_source, "Event listener finished"),
                        Err(e) => error!(source = %task_source, error = %e, "Event listener failed"),
                    }
                });
                tasks.push((source, handle));
            }
        }
        info!(count = tasks.len(), "Event listeners active");
        ListenerSet { tasks }
    }
}

/// Running listener tasks, cancelled together.
#[derive(Default)]
pub struct ListenerSet {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl ListenerSet {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn sources(&self) -> Vec<&str> {
        self.tasks.iter().map(|(source, _)| source.as_str()).collect()
    }

    /// Abort every task and wait for it to stop. Cancellation is expected.
    pub async fn shutdown(self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
        for (source, handle) in self.tasks {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!(source = %source, "Event listener cancelled"),
                Err(e) => error!(source = %source, error = %e, "Event listener panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginManifest;
    use crate::sdk::{Capability, EventListener, Namespace, ResourceProvider};
    use async_trait::async_trait;
    use raven_core::{ExecutionTarget, TargetRule};
    use raven_events::EventScope;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    struct Single;

    #[async_trait]
    impl ResourceProvider for Single {
        async fn resources(&self, kwargs: &Kwargs) -> anyhow::Result<Vec<Resource>> {
            let id = kwargs.literal("id").unwrap_or("unnamed");
            let owner = kwargs.literal("owner").unwrap_or("unknown");
            Ok(vec![Resource::new(id, owner, "state").with_category("device")])
        }
    }

    struct Broken;

    #[async_trait]
    impl ResourceProvider for Broken {
        async fn resources(&self, _kwargs: &Kwargs) -> anyhow::Result<Vec<Resource>> {
            anyhow::bail!("backend offline")
        }
    }

    struct Panicky;

    #[async_trait]
    impl ResourceProvider for Panicky {
        async fn resources(&self, _kwargs: &Kwargs) -> anyhow::Result<Vec<Resource>> {
            let empty: Vec<Resource> = Vec::new();
            Ok(vec![empty[0].clone()])
        }
    }

    struct Runaway;

    #[async_trait]
    impl ExecutionManager for Runaway {
        async fn executors(&self, _targets: &[Resource]) -> anyhow::Result<Vec<Executor>> {
            panic!("manager state corrupted")
        }

        async fn available_targets(&self, _executor: &Executor) -> anyhow::Result<Vec<Resource>> {
            Ok(Vec::new())
        }

        async fn execute(
            &self,
            _executor: &Executor,
            _arguments: &IndexMap<String, Value>,
            _target: Option<&Resource>,
        ) -> anyhow::Result<Option<Resource>> {
            Ok(None)
        }
    }

    struct Switches {
        fail: bool,
    }

    #[async_trait]
    impl ExecutionManager for Switches {
        async fn executors(&self, _targets: &[Resource]) -> anyhow::Result<Vec<Executor>> {
            if self.fail {
                anyhow::bail!("listing failed");
            }
            Ok(vec![
                Executor::new("toggle", "", "", "Toggle")
                    .with_target(TargetRule::One(ExecutionTarget::category("device"))),
                Executor::new("sensor.read", "", "", "Read")
                    .with_target(TargetRule::One(ExecutionTarget::category("sensor"))),
            ])
        }

        async fn available_targets(&self, _executor: &Executor) -> anyhow::Result<Vec<Resource>> {
            Ok(vec![
                Resource::new("lamp", "alpha", "state").with_category("device"),
                Resource::new("gauge", "alpha", "state").with_category("sensor"),
            ])
        }

        async fn execute(
            &self,
            executor: &Executor,
            _arguments: &IndexMap<String, Value>,
            target: Option<&Resource>,
        ) -> anyhow::Result<Option<Resource>> {
            if executor.id == "sensor.read" {
                anyhow::bail!("sensor unreachable");
            }
            Ok(target.cloned())
        }
    }

    struct Ticker;

    #[async_trait]
    impl EventListener for Ticker {
        async fn listen(&self, emit: Emitter, _kwargs: Kwargs) -> anyhow::Result<()> {
            loop {
                emit.emit("resource.update", json!({"entity_id": "lamp"}), EventScope::Global);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    fn namespace() -> Namespace {
        Namespace::new()
            .with("single", Capability::resource(Single))
            .with("broken", Capability::resource(Broken))
            .with(
                "switches",
                Capability::executor(|_export: &str, _kwargs: Kwargs| {
                    anyhow::Ok(Arc::new(Switches { fail: false }) as Arc<dyn ExecutionManager>)
                }),
            )
            .with(
                "faulty",
                Capability::executor(|_export: &str, _kwargs: Kwargs| {
                    anyhow::Ok(Arc::new(Switches { fail: true }) as Arc<dyn ExecutionManager>)
                }),
            )
            .with("ticker", Capability::event(Ticker))
            .with("panicky", Capability::resource(Panicky))
            .with(
                "runaway",
                Capability::executor(|_export: &str, _kwargs: Kwargs| {
                    anyhow::Ok(Arc::new(Runaway) as Arc<dyn ExecutionManager>)
                }),
            )
    }

    fn plugin(slug: &str, exports: Value) -> Plugin {
        let manifest: PluginManifest = serde_json::from_value(json!({
            "slug": slug,
            "name": slug,
            "entrypoint": "test",
            "exports": exports,
        }))
        .unwrap();
        Plugin::bind(PathBuf::from(slug), manifest, &namespace()).unwrap()
    }

    fn provider(slug: &str, id: &str) -> Value {
        json!({"type": "resource", "member": "single", "kwargs": {"id": id, "owner": slug}})
    }

    fn runtime(plugins: Vec<Plugin>) -> PluginRuntime {
        let mut registry = PluginRegistry::new();
        for p in plugins {
            registry.insert(p).unwrap();
        }
        PluginRuntime::new(registry, Arc::new(LifecycleRegistry::new()))
    }

    #[tokio::test]
    async fn test_two_plugins_two_resources() {
        let rt = runtime(vec![
            plugin("alpha", json!({"res": provider("alpha", "a1")})),
            plugin("beta", json!({"res": provider("beta", "b1")})),
        ]);
        let gathered = rt.get_resources().await;
        assert!(gathered.is_complete());
        let mut ids: Vec<(String, String)> = gathered
            .items
            .into_iter()
            .map(|r| (r.plugin, r.id))
            .collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![("alpha".into(), "a1".into()), ("beta".into(), "b1".into())]
        );
    }

    #[tokio::test]
    async fn test_failing_provider_is_isolated() {
        let rt = runtime(vec![
            plugin(
                "alpha",
                json!({"bad": {"type": "resource", "member": "broken"}, "res": provider("alpha", "a1")}),
            ),
            plugin("beta", json!({"res": provider("beta", "b1")})),
        ]);
        let gathered = rt.get_resources().await;
        assert_eq!(gathered.items.len(), 2);
        assert_eq!(gathered.failures.len(), 1);
        assert!(matches!(
            &gathered.failures[0],
            RavenError::PluginExecution { plugin, export, .. } if plugin == "alpha" && export == "bad"
        ));
    }

    #[tokio::test]
    async fn test_panicking_provider_is_isolated() {
        let rt = runtime(vec![
            plugin("alpha", json!({"crash": {"type": "resource", "member": "panicky"}})),
            plugin("beta", json!({"res": provider("beta", "b1")})),
        ]);
        let gathered = rt.get_resources().await;
        assert_eq!(gathered.items.len(), 1);
        assert_eq!(gathered.items[0].id, "b1");
        assert_eq!(gathered.failures.len(), 1);
        assert!(matches!(
            &gathered.failures[0],
            RavenError::PluginExecution { plugin, export, source }
                if plugin == "alpha" && export == "crash" && source.to_string().contains("panicked")
        ));
    }

    #[tokio::test]
    async fn test_panicking_manager_is_isolated() {
        let rt = runtime(vec![plugin(
            "alpha",
            json!({
                "runaway": {"type": "executor", "member": "runaway"},
                "switches": {"type": "executor", "member": "switches"}
            }),
        )]);
        let gathered = rt.get_executors_for_resources(&[]).await;
        assert_eq!(gathered.items.len(), 2);
        assert!(matches!(
            &gathered.failures[..],
            [RavenError::PluginExecution { export, .. }] if export == "runaway"
        ));
    }

    #[tokio::test]
    async fn test_resources_filtered_by_scope() {
        let rt = runtime(vec![
            plugin("alpha", json!({"res": provider("alpha", "a1")})),
            plugin("beta", json!({"res": provider("beta", "b1")})),
        ]);

        let everyone = User::new("u1", "default");
        assert_eq!(rt.resources_for(&everyone).await.items.len(), 2);

        let limited = User::new("u2", "limited").with_scopes(["resources.plugin.beta.view"]);
        let items = rt.resources_for(&limited).await.items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].plugin, "beta");

        let nobody = User::new("u3", "nobody").with_scopes(Vec::<String>::new());
        assert!(rt.resources_for(&nobody).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_executors_isolated_and_filtered() {
        let rt = runtime(vec![plugin(
            "alpha",
            json!({
                "switches": {"type": "executor", "member": "switches"},
                "faulty": {"type": "executor", "member": "faulty"}
            }),
        )]);

        let all = rt.get_executors_for_resources(&[]).await;
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.failures.len(), 1);
        assert!(all.items.iter().all(|e| e.plugin == "alpha" && e.export == "switches"));

        let lamp = Resource::new("lamp", "alpha", "state").with_category("device");
        let for_lamp = rt.get_executors_for_resources(&[lamp]).await;
        let ids: Vec<&str> = for_lamp.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["toggle"]);
    }

    #[tokio::test]
    async fn test_call_executor_outcomes() {
        let rt = runtime(vec![plugin(
            "alpha",
            json!({"switches": {"type": "executor", "member": "switches"}}),
        )]);
        let executors = rt.get_executors_for_resources(&[]).await.items;
        let toggle = executors.iter().find(|e| e.id == "toggle").unwrap();
        let read = executors.iter().find(|e| e.id == "sensor.read").unwrap();
        let lamp = Resource::new("lamp", "alpha", "state").with_category("device");
        let args = IndexMap::new();

        let result = rt.call_executor(toggle, &args, Some(&lamp)).await.unwrap();
        assert_eq!(result.map(|r| r.id), Some("lamp".to_string()));

        let err = rt.call_executor(read, &args, Some(&lamp)).await.unwrap_err();
        assert!(matches!(err, RavenError::TargetMismatch { .. }));

        let err = rt.call_executor(read, &args, None).await.unwrap_err();
        assert!(matches!(err, RavenError::PluginExecution { .. }));

        let mut stray = toggle.clone();
        stray.export = "elsewhere".into();
        let err = rt.call_executor(&stray, &args, None).await.unwrap_err();
        assert!(matches!(err, RavenError::UnknownExecutor { .. }));

        let extra = IndexMap::from([("bogus".to_string(), json!(1))]);
        let err = rt.call_executor(toggle, &extra, None).await.unwrap_err();
        assert!(matches!(err, RavenError::InvalidArguments { .. }));

        let targets = rt.executor_targets(toggle).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, "lamp");
    }

    #[tokio::test]
    async fn test_call_executor_uses_manager_definition() {
        let rt = runtime(vec![plugin(
            "alpha",
            json!({"switches": {"type": "executor", "member": "switches"}}),
        )]);
        let toggle = rt
            .get_executors_for_resources(&[])
            .await
            .items
            .into_iter()
            .find(|e| e.id == "toggle")
            .unwrap();
        let gauge = Resource::new("gauge", "alpha", "state").with_category("sensor");
        let args = IndexMap::new();

        let mut untargeted = toggle.clone();
        untargeted.targets.clear();
        let err = rt.call_executor(&untargeted, &args, Some(&gauge)).await.unwrap_err();
        assert!(matches!(err, RavenError::TargetMismatch { .. }));

        let mut loosened = toggle.clone();
        loosened.arguments.insert(
            "bogus".into(),
            raven_core::ExecArgument::new("bogus", raven_core::ExecArgumentKind::Object),
        );
        let extra = IndexMap::from([("bogus".to_string(), json!({}))]);
        let err = rt.call_executor(&loosened, &extra, None).await.unwrap_err();
        assert!(matches!(err, RavenError::InvalidArguments { .. }));

        let mut invented = toggle.clone();
        invented.id = "self.destruct".into();
        let err = rt.call_executor(&invented, &args, None).await.unwrap_err();
        assert!(matches!(
            err,
            RavenError::UnknownExecutor { ref executor, .. } if executor == "self.destruct"
        ));

        let mut untargeted = toggle;
        untargeted.targets.clear();
        let everything = rt.executor_targets(&untargeted).await.unwrap();
        assert_eq!(everything.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["lamp"]);
    }

    #[tokio::test]
    async fn test_listeners_emit_and_cancel_quietly() {
        let rt = runtime(vec![plugin("alpha", json!({"tick": {"type": "event", "member": "ticker"}}))]);
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let listeners = rt.activate_listeners(&bus);
        assert_eq!(listeners.sources(), vec!["alpha:tick"]);

        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let event = raven_events::Event::decode(&message).unwrap();
        assert_eq!(event.source, "alpha:tick");
        assert_eq!(event.path(), "resource.update");

        listeners.shutdown().await;
    }

    #[test]
    fn test_context_kwargs_bind_to_own_plugin() {
        let mut context = LifecycleRegistry::new();
        context.register("alpha", "client", Arc::new(7_u32)).unwrap();
        context.register("beta", "client", Arc::new(9_u32)).unwrap();
        let declaration: KwargsExport = serde_json::from_value(json!({
            "member": "m",
            "kwargs": {"client": {"context": "client"}, "mode": "fast", "gone": {"context": "absent"}}
        }))
        .unwrap();

        let kwargs = bind_kwargs("alpha", &declaration, &context);
        assert_eq!(*kwargs.context::<u32>("client").unwrap(), 7);
        assert_eq!(kwargs.literal("mode"), Some("fast"));
        assert!(kwargs.context::<u32>("gone").is_none());
    }
}
