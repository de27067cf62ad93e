//! The closed event catalog.
//!
//! Every event kind is a variant of [`EventPayload`], keyed by its dotted
//! path. Emitting an unknown path, or a payload that does not fit its kind,
//! is rejected at construction.

use chrono::{DateTime, Utc};
use raven_core::RavenError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Source name used for events emitted by the platform itself.
pub const CORE_SOURCE: &str = "core";

/// Who may receive an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventScope {
    /// Every subscriber, authenticated or not.
    #[default]
    Global,
    /// Only principals holding any of these scopes.
    Scoped(Vec<String>),
}

impl EventScope {
    pub fn scoped<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Scoped(scopes.into_iter().map(Into::into).collect())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl Serialize for EventScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Global => serializer.serialize_str("global"),
            Self::Scoped(scopes) => scopes.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for EventScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Word(String),
            List(Vec<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Word(word) if word == "global" => Ok(Self::Global),
            Repr::Word(word) => Err(D::Error::custom(format!(
                "expected \"global\" or a list of scopes, got \"{word}\""
            ))),
            Repr::List(scopes) => Ok(Self::Scoped(scopes)),
        }
    }
}

/// Kind-specific event body, tagged by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path")]
pub enum EventPayload {
    #[serde(rename = "resource.update")]
    ResourceUpdate { entity_id: String },
    #[serde(rename = "resource.create")]
    ResourceCreate { entity_id: String },
    #[serde(rename = "resource.delete")]
    ResourceDelete { entity_id: String },
}

impl EventPayload {
    /// Every registered path.
    pub const PATHS: [&'static str; 3] = ["resource.update", "resource.create", "resource.delete"];

    pub fn path(&self) -> &'static str {
        match self {
            Self::ResourceUpdate { .. } => "resource.update",
            Self::ResourceCreate { .. } => "resource.create",
            Self::ResourceDelete { .. } => "resource.delete",
        }
    }

    pub fn is_registered(path: &str) -> bool {
        Self::PATHS.contains(&path)
    }

    /// Build the payload registered under `path` from loose emitter data.
    pub fn from_parts(path: &str, data: Value) -> Result<Self, RavenError> {
        if !Self::is_registered(path) {
            return Err(RavenError::EventDecode(format!("unregistered event path '{path}'")));
        }
        let mut fields = match data {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                return Err(RavenError::EventDecode(format!(
                    "event data for '{path}' must be an object, got {other}"
                )));
            }
        };
        fields.insert("path".into(), Value::String(path.to_string()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| RavenError::EventDecode(format!("{path}: {e}")))
    }

    /// Payload fields without the path tag.
    pub fn data(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(fields) = &mut value {
            fields.remove("path");
        }
        value
    }
}

/// An emitted event instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub scope: EventScope,
    pub emitted: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload, scope: EventScope) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            source: source.into(),
            scope,
            emitted: Utc::now(),
            payload,
        }
    }

    pub fn path(&self) -> &'static str {
        self.payload.path()
    }

    pub fn encode(&self) -> Result<String, RavenError> {
        serde_json::to_string(self).map_err(|e| RavenError::EventDecode(e.to_string()))
    }

    /// Decode a bus message. Unknown paths and malformed JSON are errors.
    pub fn decode(message: &str) -> Result<Self, RavenError> {
        serde_json::from_str(message).map_err(|e| RavenError::EventDecode(e.to_string()))
    }
}
