//! Resources: typed, inspectable entities contributed by plugins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a property value should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourcePropertyType {
    Object,
    Text,
    Number,
    Date,
    Time,
    Datetime,
    Color,
    Option,
    List,
}

/// A single named value on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: ResourcePropertyType,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl ResourceProperty {
    pub fn new(kind: ResourcePropertyType, value: impl Into<serde_json::Value>) -> Self {
        Self {
            label: None,
            kind,
            value: value.into(),
            icon: None,
            prefix: None,
            suffix: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ResourcePropertyType::Text, value.into())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An entity a plugin exposes for viewing or acting upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub plugin: String,
    #[serde(default)]
    pub metadata: ResourceMetadata,
    pub properties: IndexMap<String, ResourceProperty>,
    /// Name of the authoritative property in `properties`.
    pub state_key: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, plugin: impl Into<String>, state_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plugin: plugin.into(),
            metadata: ResourceMetadata::default(),
            properties: IndexMap::new(),
            state_key: state_key.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, property: ResourceProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// The property named by `state_key`, if present.
    pub fn state(&self) -> Option<&ResourceProperty> {
        self.properties.get(&self.state_key)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }
}
