pub mod catalog;
pub mod lifecycle;
pub mod manifest;
pub mod platform;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod sdk;

pub use catalog::PluginCatalog;
pub use lifecycle::{LifecycleRecord, LifecycleRegistry, LifecycleStack, acquire_all};
pub use manifest::{
    ExportDeclaration, ExportKind, ExportTarget, KwargValue, KwargsExport, LifecycleExport,
    PluginDependency, PluginManifest,
};
pub use platform::Platform;
pub use registry::{Plugin, PluginRegistry};
pub use resolver::{ResolvedExport, resolve};
pub use runtime::{ALL_RESOURCES_SCOPE, Gathered, ListenerSet, PluginRuntime, bind_kwargs};
pub use sdk::{
    AsyncLifecycle, Capability, ContextValue, Entrypoint, EventListener, ExecutionManager,
    ExecutorFactory, KwargArg, Kwargs, LifecycleInput, LifecycleProvider, Member, Namespace,
    ResourceProvider, SyncLifecycle,
};
