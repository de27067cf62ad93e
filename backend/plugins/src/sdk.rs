//! Plugin SDK
//!
//! The registration contract between the platform and plugin code. A plugin
//! exposes one entry point returning a [`Namespace`]: a tree of named
//! [`Capability`] records. Manifest exports are bound against that tree once,
//! at load time.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use raven_core::{Executor, Resource};
use raven_events::Emitter;
use serde_json::Value;

use crate::lifecycle::LifecycleRegistry;
use crate::manifest::ExportKind;

/// An opaque shared value held in the lifecycle registry.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// A plugin's registration entry point.
pub type Entrypoint = fn() -> Namespace;

/// One resolved export argument.
#[derive(Clone)]
pub enum KwargArg {
    Literal(String),
    /// Lifecycle value; `None` when nothing was registered under the key.
    Context(Option<ContextValue>),
}

/// Arguments handed to resource providers, execution managers, and listeners.
#[derive(Clone, Default)]
pub struct Kwargs {
    values: IndexMap<String, KwargArg>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, arg: KwargArg) {
        self.values.insert(name.into(), arg);
    }

    pub fn literal(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(KwargArg::Literal(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// The lifecycle value bound to `name`, downcast to `T`.
    pub fn context<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name) {
            Some(KwargArg::Context(Some(value))) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Like [`context`](Self::context), failing when absent or of another type.
    pub fn require_context<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.context(name).ok_or_else(|| {
            anyhow::anyhow!(
                "kwarg '{name}' is not a {} context value",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a lifecycle acquisition sees.
pub struct LifecycleInput<'a> {
    pub plugin: &'a str,
    /// This plugin's settings from the platform config, `{}` when absent.
    pub settings: &'a Value,
    /// Entries acquired so far, in acquisition order.
    pub registry: &'a LifecycleRegistry,
}

/// Blocking acquisition of shared context.
pub trait SyncLifecycle: Send + Sync {
    fn acquire(&self, input: &LifecycleInput<'_>) -> Result<ContextValue>;

    fn release(&self, _value: ContextValue) -> Result<()> {
        Ok(())
    }
}

/// Suspendable acquisition of shared context.
#[async_trait]
pub trait AsyncLifecycle: Send + Sync {
    async fn acquire(&self, input: &LifecycleInput<'_>) -> Result<ContextValue>;

    async fn release(&self, _value: ContextValue) -> Result<()> {
        Ok(())
    }
}

/// Either acquisition flavour behind one interface.
#[derive(Clone)]
pub enum LifecycleProvider {
    Sync(Arc<dyn SyncLifecycle>),
    Async(Arc<dyn AsyncLifecycle>),
}

impl LifecycleProvider {
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    pub async fn acquire(&self, input: &LifecycleInput<'_>) -> Result<ContextValue> {
        match self {
            Self::Sync(provider) => provider.acquire(input),
            Self::Async(provider) => provider.acquire(input).await,
        }
    }

    pub async fn release(&self, value: ContextValue) -> Result<()> {
        match self {
            Self::Sync(provider) => provider.release(value),
            Self::Async(provider) => provider.release(value).await,
        }
    }
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn resources(&self, kwargs: &Kwargs) -> Result<Vec<Resource>>;
}

/// Offers and runs executors for one executor export.
#[async_trait]
pub trait ExecutionManager: Send + Sync {
    /// Executors applicable to `targets`.
    async fn executors(&self, targets: &[Resource]) -> Result<Vec<Executor>>;

    /// Resources `executor` could be run against.
    async fn available_targets(&self, _executor: &Executor) -> Result<Vec<Resource>> {
        Ok(Vec::new())
    }

    async fn execute(
        &self,
        executor: &Executor,
        arguments: &IndexMap<String, Value>,
        target: Option<&Resource>,
    ) -> Result<Option<Resource>>;
}

/// Builds an [`ExecutionManager`] bound to an export name and its kwargs.
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, export: &str, kwargs: Kwargs) -> Result<Arc<dyn ExecutionManager>>;
}

impl<F> ExecutorFactory for F
where
    F: Fn(&str, Kwargs) -> Result<Arc<dyn ExecutionManager>> + Send + Sync,
{
    fn build(&self, export: &str, kwargs: Kwargs) -> Result<Arc<dyn ExecutionManager>> {
        self(export, kwargs)
    }
}

/// A long-running task producing events.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn listen(&self, emit: Emitter, kwargs: Kwargs) -> Result<()>;
}

/// A concrete capability a namespace member provides.
#[derive(Clone)]
pub enum Capability {
    Lifecycle(LifecycleProvider),
    Resource(Arc<dyn ResourceProvider>),
    Executor(Arc<dyn ExecutorFactory>),
    Event(Arc<dyn EventListener>),
}

impl Capability {
    pub fn kind(&self) -> ExportKind {
        match self {
            Self::Lifecycle(_) => ExportKind::Lifecycle,
            Self::Resource(_) => ExportKind::Resource,
            Self::Executor(_) => ExportKind::Executor,
            Self::Event(_) => ExportKind::Event,
        }
    }

    pub fn sync_lifecycle(provider: impl SyncLifecycle + 'static) -> Self {
        Self::Lifecycle(LifecycleProvider::Sync(Arc::new(provider)))
    }

    pub fn async_lifecycle(provider: impl AsyncLifecycle + 'static) -> Self {
        Self::Lifecycle(LifecycleProvider::Async(Arc::new(provider)))
    }

    pub fn resource(provider: impl ResourceProvider + 'static) -> Self {
        Self::Resource(Arc::new(provider))
    }

    pub fn executor(factory: impl ExecutorFactory + 'static) -> Self {
        Self::Executor(Arc::new(factory))
    }

    pub fn event(listener: impl EventListener + 'static) -> Self {
        Self::Event(Arc::new(listener))
    }
}

#[derive(Clone)]
pub enum Member {
    Namespace(Namespace),
    Capability(Capability),
}

/// A plugin's exported tree.
#[derive(Clone, Default)]
pub struct Namespace {
    members: HashMap<String, Member>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, capability: Capability) -> Self {
        self.members.insert(name.into(), Member::Capability(capability));
        self
    }

    pub fn with_namespace(mut self, name: impl Into<String>, namespace: Namespace) -> Self {
        self.members.insert(name.into(), Member::Namespace(namespace));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
