//! Binds manifest export declarations to capabilities in a plugin namespace.

use std::sync::Arc;

use raven_core::{RavenError, RavenResult};

use crate::manifest::{ExportDeclaration, KwargsExport, LifecycleExport};
use crate::sdk::{
    Capability, EventListener, ExecutorFactory, LifecycleProvider, Member, Namespace,
    ResourceProvider,
};

/// A declaration together with the capability it resolved to.
#[derive(Clone)]
pub enum ResolvedExport {
    Lifecycle {
        declaration: LifecycleExport,
        provider: LifecycleProvider,
    },
    Resource {
        declaration: KwargsExport,
        provider: Arc<dyn ResourceProvider>,
    },
    Executor {
        declaration: KwargsExport,
        factory: Arc<dyn ExecutorFactory>,
    },
    Event {
        declaration: KwargsExport,
        listener: Arc<dyn EventListener>,
    },
}

/// Resolve `declaration` (named `export` in `plugin`'s manifest) against `namespace`.
///
/// Each segment of the import path must name a sub-namespace; the member
/// must be a capability of the declared kind.
pub fn resolve(
    plugin: &str,
    export: &str,
    declaration: &ExportDeclaration,
    namespace: &Namespace,
) -> RavenResult<ResolvedExport> {
    let target = declaration.target();
    let fail = |message: String| RavenError::resolution(plugin, export, message);

    let mut current = namespace;
    for segment in target.segments() {
        current = match current.get(segment) {
            Some(Member::Namespace(inner)) => inner,
            Some(Member::Capability(_)) => {
                return Err(fail(format!("'{segment}' is not a namespace")));
            }
            None => return Err(fail(format!("unknown namespace '{segment}'"))),
        };
    }

    let capability = match current.get(&target.member) {
        Some(Member::Capability(capability)) => capability.clone(),
        Some(Member::Namespace(_)) => {
            return Err(fail(format!("{target} is a namespace, not a capability")));
        }
        None => return Err(fail(format!("unknown member {target}"))),
    };

    match (declaration, capability) {
        (ExportDeclaration::Lifecycle(declaration), Capability::Lifecycle(provider)) => {
            if declaration.is_async != provider.is_async() {
                return Err(fail(format!(
                    "declared is_async={} but {target} is {}",
                    declaration.is_async,
                    if provider.is_async() { "async" } else { "sync" }
                )));
            }
            Ok(ResolvedExport::Lifecycle {
                declaration: declaration.clone(),
                provider,
            })
        }
        (ExportDeclaration::Resource(declaration), Capability::Resource(provider)) => {
            Ok(ResolvedExport::Resource {
                declaration: declaration.clone(),
                provider,
            })
        }
        (ExportDeclaration::Executor(declaration), Capability::Executor(factory)) => {
            Ok(ResolvedExport::Executor {
                declaration: declaration.clone(),
                factory,
            })
        }
        (ExportDeclaration::Event(declaration), Capability::Event(listener)) => {
            Ok(ResolvedExport::Event {
                declaration: declaration.clone(),
                listener,
            })
        }
        (declaration, capability) => Err(fail(format!(
            "declared as {} but {target} provides {}",
            declaration.kind(),
            capability.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ExportKind, ExportTarget};
    use crate::sdk::{ContextValue, Kwargs, LifecycleInput, SyncLifecycle};
    use async_trait::async_trait;
    use raven_core::Resource;

    struct Empty;

    #[async_trait]
    impl ResourceProvider for Empty {
        async fn resources(&self, _kwargs: &Kwargs) -> anyhow::Result<Vec<Resource>> {
            Ok(Vec::new())
        }
    }

    struct Conf;

    impl SyncLifecycle for Conf {
        fn acquire(&self, _input: &LifecycleInput<'_>) -> anyhow::Result<ContextValue> {
            Ok(Arc::new(()))
        }
    }

    fn namespace() -> Namespace {
        Namespace::new()
            .with("conf", Capability::sync_lifecycle(Conf))
            .with_namespace(
                "providers",
                Namespace::new().with_namespace("lights", Namespace::new().with("list", Capability::resource(Empty))),
            )
    }

    fn resource_at(path: Option<&str>, member: &str) -> ExportDeclaration {
        ExportDeclaration::Resource(KwargsExport {
            target: ExportTarget { import_path: path.map(String::from), member: member.into() },
            kwargs: Default::default(),
        })
    }

    #[test]
    fn test_resolve_nested_member() {
        let resolved = resolve("p", "lights", &resource_at(Some("providers.lights"), "list"), &namespace()).unwrap();
        assert!(matches!(resolved, ResolvedExport::Resource { .. }));
    }

    #[test]
    fn test_unknown_segment_and_member() {
        let ns = namespace();
        let err = resolve("p", "e", &resource_at(Some("providers.fans"), "list"), &ns).err().unwrap();
        assert!(err.to_string().contains("unknown namespace 'fans'"));

        let err = resolve("p", "e", &resource_at(Some("providers.lights"), "nope"), &ns).err().unwrap();
        assert!(matches!(err, RavenError::Resolution { .. }));
    }

    #[test]
    fn test_terminal_segment_rejected() {
        let err = resolve("p", "e", &resource_at(Some("conf"), "list"), &namespace()).err().unwrap();
        assert!(err.to_string().contains("is not a namespace"));
    }

    #[test]
    fn test_kind_mismatch() {
        let err = resolve("p", "e", &resource_at(None, "conf"), &namespace()).err().unwrap();
        assert!(err.to_string().contains("declared as resource"));

        let as_executor = ExportDeclaration::Executor(KwargsExport {
            target: ExportTarget { import_path: Some("providers.lights".into()), member: "list".into() },
            kwargs: Default::default(),
        });
        assert_eq!(as_executor.kind(), ExportKind::Executor);
        assert!(resolve("p", "e", &as_executor, &namespace()).is_err());
    }

    #[test]
    fn test_lifecycle_flavour_must_agree() {
        let declared = |is_async| {
            ExportDeclaration::Lifecycle(LifecycleExport {
                target: ExportTarget { import_path: None, member: "conf".into() },
                context_key: "config".into(),
                is_async,
            })
        };
        assert!(resolve("p", "e", &declared(false), &namespace()).is_ok());
        assert!(resolve("p", "e", &declared(true), &namespace()).is_err());
    }
}
