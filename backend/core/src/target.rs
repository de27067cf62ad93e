//! Structural predicates pairing resources with executors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::Resource;

/// A value that may be given either once or as a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    pub fn contains(&self, item: &T) -> bool {
        match self {
            Self::One(value) => value == item,
            Self::Many(values) => values.contains(item),
        }
    }

    /// An empty set carries no constraint.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(values) if values.is_empty())
    }
}

/// One element of a tag list: a single tag, or a group that must all be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagGroup {
    Tag(String),
    All(Vec<String>),
}

/// Tag constraint. A list is OR across its elements, AND within any inner group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRule {
    Single(String),
    Any(Vec<TagGroup>),
}

impl TagRule {
    fn is_empty(&self) -> bool {
        matches!(self, Self::Any(groups) if groups.is_empty())
    }

    fn matches(&self, resource: &Resource) -> bool {
        match self {
            Self::Single(tag) => resource.has_tag(tag),
            Self::Any(groups) => groups.iter().any(|group| match group {
                TagGroup::Tag(tag) => resource.has_tag(tag),
                TagGroup::All(tags) => tags.iter().all(|tag| resource.has_tag(tag)),
            }),
        }
    }
}

/// Predicate over a [`Resource`]. Unset fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    #[serde(default, alias = "category", skip_serializing_if = "Option::is_none")]
    pub categories: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Map<String, Value>>,
    /// Let resources without a category pass the category check.
    #[serde(default)]
    pub allow_uncategorized: bool,
    /// Invert the whole predicate.
    #[serde(default)]
    pub exclude: bool,
}

impl ExecutionTarget {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            categories: Some(OneOrMany::One(category.into())),
            ..Default::default()
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Some(OneOrMany::Many(ids.into_iter().map(Into::into).collect())),
            ..Default::default()
        }
    }

    pub fn excluding(mut self) -> Self {
        self.exclude = !self.exclude;
        self
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.matches_inner(resource) != self.exclude
    }

    fn matches_inner(&self, resource: &Resource) -> bool {
        if let Some(categories) = self.categories.as_ref().filter(|c| !c.is_empty()) {
            match &resource.metadata.category {
                None if !self.allow_uncategorized => return false,
                None => {}
                Some(category) => {
                    if !categories.contains(category) {
                        return false;
                    }
                }
            }
        }

        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            if !tags.matches(resource) {
                return false;
            }
        }

        if let Some(ids) = self.id.as_ref().filter(|i| !i.is_empty()) {
            if !ids.contains(&resource.id) {
                return false;
            }
        }

        if let Some(fragment) = self.fragment.as_ref().filter(|f| !f.is_empty()) {
            let Ok(Value::Object(serialized)) = serde_json::to_value(resource) else {
                return false;
            };
            if !match_fragment(fragment, &serialized) {
                return false;
            }
        }

        true
    }
}

/// Structural containment: every key of `fragment` must exist in `test` with
/// an equal scalar, a contained list, or a recursively matching object.
pub fn match_fragment(fragment: &Map<String, Value>, test: &Map<String, Value>) -> bool {
    fragment.iter().all(|(key, expected)| match test.get(key) {
        Some(actual) => match_value(expected, actual),
        None => false,
    })
}

fn match_value(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => match_fragment(expected, actual),
        (Value::Array(expected), Value::Array(actual)) => {
            expected.iter().all(|item| actual.contains(item))
        }
        (Value::Object(_), _) | (Value::Array(_), _) => false,
        _ => expected == actual,
    }
}
