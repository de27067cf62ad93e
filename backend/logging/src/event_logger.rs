//! Platform Event Logger
//!
//! Emitted events written through tracing, so they land in the rolling
//! NDJSON file alongside everything else.

use chrono::{DateTime, Utc};
use raven_events::{Event, EventScope};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::redact::redact_value;

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub id: String,
    pub source: String,
    pub path: String,
    pub scope: EventScope,
    pub emitted: DateTime<Utc>,
    pub data: Value,
}

impl EventLogEntry {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            source: event.source.clone(),
            path: event.path().to_string(),
            scope: event.scope.clone(),
            emitted: event.emitted,
            data: redact_value(&event.payload.data()),
        }
    }
}

pub struct EventLogger;

impl EventLogger {
    pub fn log_event(event: &Event) {
        let entry = EventLogEntry::from_event(event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "platform_events", path = %entry.path, event = %json, "Platform event"),
            Err(e) => warn!(target: "platform_events", error = %e, "Unloggable platform event"),
        }
    }

    /// Decode a raw bus message and log it. Undecodable messages are warned.
    pub fn log_message(message: &str) {
        match Event::decode(message) {
            Ok(event) => Self::log_event(&event),
            Err(e) => warn!(target: "platform_events", error = %e, "Dropping undecodable bus message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_events::EventPayload;

    #[test]
    fn test_entry_flattens_event() {
        let event = Event::new(
            "host:heartbeat",
            EventPayload::ResourceUpdate {
                entity_id: "host".into(),
            },
            EventScope::scoped(["admin.*"]),
        );
        let entry = EventLogEntry::from_event(&event);
        assert_eq!(entry.path, "resource.update");
        assert_eq!(entry.source, "host:heartbeat");
        assert_eq!(entry.data["entity_id"], "host");
        assert!(!entry.scope.is_global());
    }
}
