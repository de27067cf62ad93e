//! The platform context: everything a running process shares, created by
//! [`Platform::boot`] and torn down by [`Platform::shutdown`].

use std::collections::HashMap;
use std::sync::Arc;

use raven_core::RavenResult;
use raven_events::{Emitter, EventBus, EventConnection};
use raven_security::{ScopeTree, User};
use serde_json::Value;
use tracing::{info, warn};

use crate::lifecycle::{LifecycleRegistry, LifecycleStack, acquire_all};
use crate::registry::PluginRegistry;
use crate::runtime::{ListenerSet, PluginRuntime};

pub struct Platform {
    scopes: ScopeTree,
    bus: EventBus,
    runtime: PluginRuntime,
    lifecycle: LifecycleStack,
    listeners: ListenerSet,
}

impl Platform {
    /// Acquire lifecycle context, bind the runtime, then start listeners.
    ///
    /// `settings` maps plugin slugs to their configuration. On failure no
    /// acquired context survives.
    pub async fn boot(
        registry: PluginRegistry,
        settings: &HashMap<String, Value>,
        bus: EventBus,
    ) -> RavenResult<Self> {
        for slug in settings.keys() {
            if registry.get(slug).is_none() {
                warn!(plugin = %slug, "Settings given for a plugin that is not loaded");
            }
        }

        let scopes = ScopeTree::with_plugins(
            registry
                .plugins()
                .map(|p| (p.manifest.slug.as_str(), p.manifest.name.as_str())),
        );

        let mut context = LifecycleRegistry::new();
        let lifecycle = acquire_all(registry.lifecycle_records(settings), &mut context).await?;

        let runtime = PluginRuntime::new(registry, Arc::new(context));
        let listeners = runtime.activate_listeners(&bus);

        info!(
            plugins = runtime.manifests().len(),
            context = lifecycle.len(),
            listeners = listeners.len(),
            "Platform booted"
        );
        Ok(Self {
            scopes,
            bus,
            runtime,
            lifecycle,
            listeners,
        })
    }

    pub fn runtime(&self) -> &PluginRuntime {
        &self.runtime
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Emitter sourced as the platform itself.
    pub fn emitter(&self) -> Emitter {
        Emitter::core(self.bus.clone())
    }

    /// A delivery loop for one client.
    pub fn connect(&self, user: Option<User>, subscriptions: Vec<String>) -> EventConnection {
        EventConnection::new(&self.bus, user, subscriptions)
    }

    /// Cancel listeners, then release lifecycle context in reverse order.
    pub async fn shutdown(self) {
        let Self {
            runtime,
            lifecycle,
            listeners,
            ..
        } = self;
        listeners.shutdown().await;
        drop(runtime);
        let failures = lifecycle.release_all().await;
        if failures > 0 {
            warn!(failures, "Platform stopped with release failures");
        } else {
            info!("Platform stopped");
        }
    }
}
