//! Telemetry and structured logging for the Raven daemon.
//!
//! Handles subscriber setup with optional rolling NDJSON files, secret
//! redaction, and logging of emitted platform events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::{redact_sensitive_data, redact_value};
