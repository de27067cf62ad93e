//! Emission handles given to plugin listeners and core code.

use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::event::{Event, EventPayload, EventScope, CORE_SOURCE};

/// Emits events onto the bus under a fixed source name.
#[derive(Clone)]
pub struct Emitter {
    bus: EventBus,
    source: String,
}

impl Emitter {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    /// Emitter for the platform itself.
    pub fn core(bus: EventBus) -> Self {
        Self::new(bus, CORE_SOURCE)
    }

    /// Emitter for a plugin export, sourced as `<plugin>:<export>`.
    pub fn for_export(bus: EventBus, plugin: &str, export: &str) -> Self {
        Self::new(bus, format!("{plugin}:{export}"))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Build and publish the event registered under `path`.
    ///
    /// Construction failures are logged and swallowed; the returned id is
    /// `None` in that case.
    pub fn emit(&self, path: &str, data: Value, scope: EventScope) -> Option<String> {
        match EventPayload::from_parts(path, data) {
            Ok(payload) => Some(self.emit_payload(payload, scope)),
            Err(e) => {
                warn!(source = %self.source, path = %path, error = %e, "Dropping unemittable event");
                None
            }
        }
    }

    /// Publish an already-typed payload.
    pub fn emit_payload(&self, payload: EventPayload, scope: EventScope) -> String {
        let event = Event::new(self.source.clone(), payload, scope);
        debug!(source = %self.source, path = %event.path(), id = %event.id, "Emitting event");
        self.bus.publish(&event);
        event.id
    }
}
