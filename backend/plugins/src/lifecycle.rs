//! Lifecycle context: plugin-scoped shared state acquired in a fixed order
//! at boot and released in exactly the reverse order at shutdown.
//!
//! Acquisition order is plugin discovery order, then declaration order
//! within each manifest. Later entries may read earlier ones through
//! [`LifecycleInput::registry`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use raven_core::{RavenError, RavenResult};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::sdk::{ContextValue, LifecycleInput, LifecycleProvider};

/// Shared context keyed by `(plugin slug, context key)`.
#[derive(Default)]
pub struct LifecycleRegistry {
    entries: HashMap<(String, String), ContextValue>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value. A key may only ever be registered once.
    pub fn register(&mut self, plugin: &str, key: &str, value: ContextValue) -> RavenResult<()> {
        if self.contains(plugin, key) {
            return Err(RavenError::DuplicateRegistration {
                plugin: plugin.to_string(),
                context_key: key.to_string(),
            });
        }
        self.entries.insert((plugin.to_string(), key.to_string()), value);
        Ok(())
    }

    pub fn get_raw(&self, plugin: &str, key: &str) -> Option<ContextValue> {
        self.entries
            .get(&(plugin.to_string(), key.to_string()))
            .cloned()
    }

    pub fn get<T: Any + Send + Sync>(&self, plugin: &str, key: &str) -> Option<Arc<T>> {
        self.get_raw(plugin, key)?.downcast::<T>().ok()
    }

    pub fn contains(&self, plugin: &str, key: &str) -> bool {
        self.entries
            .contains_key(&(plugin.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One lifecycle export scheduled for acquisition.
#[derive(Clone)]
pub struct LifecycleRecord {
    pub plugin: String,
    pub context_key: String,
    pub provider: LifecycleProvider,
    pub settings: Value,
}

struct Acquired {
    plugin: String,
    context_key: String,
    provider: LifecycleProvider,
    value: ContextValue,
}

/// Guard stack of acquired context, released last-in first-out.
#[derive(Default)]
pub struct LifecycleStack {
    acquired: Vec<Acquired>,
}

impl LifecycleStack {
    pub fn len(&self) -> usize {
        self.acquired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acquired.is_empty()
    }

    /// Release everything in reverse acquisition order. Individual release
    /// failures are logged and do not stop the unwind. Returns the number
    /// of failed releases.
    pub async fn release_all(mut self) -> usize {
        let mut failures = 0;
        while let Some(entry) = self.acquired.pop() {
            debug!(plugin = %entry.plugin, key = %entry.context_key, "Releasing lifecycle context");
            if let Err(e) = entry.provider.release(entry.value).await {
                failures += 1;
                error!(
                    plugin = %entry.plugin,
                    key = %entry.context_key,
                    error = %e,
                    "Lifecycle release failed"
                );
            }
        }
        failures
    }
}

impl Drop for LifecycleStack {
    fn drop(&mut self) {
        if !self.acquired.is_empty() {
            warn!(
                remaining = self.acquired.len(),
                "Lifecycle stack dropped without release; context leaked"
            );
        }
    }
}

/// Acquire `records` one at a time, registering each value before the next
/// acquisition begins.
///
/// If entry *k* fails, entries `0..k` are released in reverse order before
/// the error is returned, so no partial state survives.
pub async fn acquire_all(
    records: Vec<LifecycleRecord>,
    registry: &mut LifecycleRegistry,
) -> RavenResult<LifecycleStack> {
    let mut stack = LifecycleStack::default();
    let total = records.len();

    for record in records {
        let acquired = {
            let input = LifecycleInput {
                plugin: &record.plugin,
                settings: &record.settings,
                registry,
            };
            record.provider.acquire(&input).await
        };

        let value = match acquired {
            Ok(value) => value,
            Err(source) => {
                error!(
                    plugin = %record.plugin,
                    key = %record.context_key,
                    error = %source,
                    "Lifecycle acquisition failed; rolling back"
                );
                stack.release_all().await;
                return Err(RavenError::LifecycleAcquisition {
                    plugin: record.plugin,
                    context_key: record.context_key,
                    source,
                });
            }
        };

        if let Err(e) = registry.register(&record.plugin, &record.context_key, value.clone()) {
            if let Err(release) = record.provider.release(value).await {
                warn!(error = %release, "Releasing duplicate context failed");
            }
            stack.release_all().await;
            return Err(e);
        }

        debug!(plugin = %record.plugin, key = %record.context_key, "Lifecycle context acquired");
        stack.acquired.push(Acquired {
            plugin: record.plugin,
            context_key: record.context_key,
            provider: record.provider,
            value,
        });
    }

    info!(count = total, "Lifecycle context ready");
    Ok(stack)
}
