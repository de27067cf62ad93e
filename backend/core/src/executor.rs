//! Executors: plugin actions constrained to resources matching their targets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::Resource;
use crate::target::ExecutionTarget;

/// One element of an executor's `targets` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetRule {
    /// Any one of these must match.
    AnyOf(Vec<ExecutionTarget>),
    /// This one must match.
    One(ExecutionTarget),
}

impl TargetRule {
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Self::One(target) => target.matches(resource),
            Self::AnyOf(targets) => targets.iter().any(|t| t.matches(resource)),
        }
    }
}

/// How a boolean argument is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanMode {
    Checkbox,
    #[default]
    Switch,
}

/// Type-specific part of an argument schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecArgumentKind {
    Boolean {
        #[serde(default)]
        mode: BooleanMode,
    },
    String {
        #[serde(default)]
        multiline: bool,
        #[serde(default)]
        password: bool,
        #[serde(default)]
        suggestions: Option<Vec<String>>,
    },
    Number {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default = "default_true")]
        negatives: bool,
        #[serde(default = "default_true")]
        decimals: bool,
        #[serde(default)]
        precision: Option<u32>,
    },
    Object,
    Selection {
        #[serde(default)]
        options: Vec<String>,
        #[serde(default)]
        multiple: bool,
    },
    Array {
        #[serde(default)]
        max_values: Option<usize>,
        #[serde(default)]
        suggestions: Option<Vec<String>>,
    },
    Resource {
        #[serde(default)]
        targets: Option<Vec<ExecutionTarget>>,
    },
}

fn default_true() -> bool {
    true
}

/// A named, typed executor argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecArgument {
    pub name: String,
    #[serde(flatten)]
    pub kind: ExecArgumentKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub required: bool,
}

impl ExecArgument {
    pub fn new(name: impl Into<String>, kind: ExecArgumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            description: None,
            placeholder: None,
            icon: None,
            advanced: false,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check a supplied value against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match (&self.kind, value) {
            (_, Value::Null) if !self.required => Ok(()),
            (_, Value::Null) => Err("value is required".into()),
            (ExecArgumentKind::Boolean { .. }, Value::Bool(_)) => Ok(()),
            (ExecArgumentKind::String { .. }, Value::String(_)) => Ok(()),
            (ExecArgumentKind::Number { min, max, negatives, decimals, .. }, Value::Number(n)) => {
                let n = n.as_f64().unwrap_or_default();
                if !negatives && n < 0.0 {
                    return Err("negative values are not allowed".into());
                }
                if !decimals && n.fract() != 0.0 {
                    return Err("decimal values are not allowed".into());
                }
                if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                    return Err(format!("{n} is out of range"));
                }
                Ok(())
            }
            (ExecArgumentKind::Object, Value::Object(_)) => Ok(()),
            (ExecArgumentKind::Selection { options, multiple }, value) => {
                let chosen: Vec<&Value> = match value {
                    Value::Array(items) if *multiple => items.iter().collect(),
                    Value::String(_) => vec![value],
                    _ => return Err("expected a selection".into()),
                };
                match chosen.iter().find(|c| !options.iter().any(|o| c.as_str() == Some(o))) {
                    Some(bad) => Err(format!("{bad} is not an option")),
                    None => Ok(()),
                }
            }
            (ExecArgumentKind::Array { max_values, .. }, Value::Array(items)) => {
                match max_values {
                    Some(max) if items.len() > *max => Err(format!("at most {max} values")),
                    _ => Ok(()),
                }
            }
            (ExecArgumentKind::Resource { .. }, Value::String(_)) => Ok(()),
            (kind, other) => Err(format!("{other} does not fit {}", kind_name(kind))),
        }
    }
}

fn kind_name(kind: &ExecArgumentKind) -> &'static str {
    match kind {
        ExecArgumentKind::Boolean { .. } => "boolean",
        ExecArgumentKind::String { .. } => "string",
        ExecArgumentKind::Number { .. } => "number",
        ExecArgumentKind::Object => "object",
        ExecArgumentKind::Selection { .. } => "selection",
        ExecArgumentKind::Array { .. } => "array",
        ExecArgumentKind::Resource { .. } => "resource",
    }
}

/// An action a plugin offers, as returned by its execution manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executor {
    pub id: String,
    pub plugin: String,
    /// Name of the executor export that produced this executor.
    pub export: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// AND across elements; an inner list is OR across its members.
    #[serde(default)]
    pub targets: Vec<TargetRule>,
    #[serde(default)]
    pub arguments: IndexMap<String, ExecArgument>,
}

impl Executor {
    pub fn new(
        id: impl Into<String>,
        plugin: impl Into<String>,
        export: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plugin: plugin.into(),
            export: export.into(),
            name: name.into(),
            description: None,
            targets: Vec::new(),
            arguments: IndexMap::new(),
        }
    }

    pub fn with_target(mut self, rule: TargetRule) -> Self {
        self.targets.push(rule);
        self
    }

    /// Add `argument`, keyed by its name.
    pub fn with_argument(mut self, argument: ExecArgument) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    pub fn matches_resource(&self, resource: &Resource) -> bool {
        self.targets.iter().all(|rule| rule.matches(resource))
    }

    /// Validate call arguments against the schema. Unknown names are rejected.
    pub fn validate_arguments(&self, arguments: &IndexMap<String, Value>) -> Result<(), String> {
        if let Some(unknown) = arguments.keys().find(|k| !self.arguments.contains_key(*k)) {
            return Err(format!("unknown argument '{unknown}'"));
        }
        for (name, schema) in &self.arguments {
            let value = arguments.get(name).unwrap_or(&Value::Null);
            schema
                .validate(value)
                .map_err(|e| format!("argument '{name}': {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(id: &str, category: &str) -> Resource {
        Resource::new(id, "home", "state").with_category(category)
    }

    #[test]
    fn test_no_targets_matches_all() {
        let exec = Executor::new("toggle", "home", "switches", "Toggle");
        assert!(exec.matches_resource(&resource("a", "light")));
    }

    #[test]
    fn test_targets_and_of_or_groups() {
        let exec = Executor::new("toggle", "home", "switches", "Toggle")
            .with_target(TargetRule::AnyOf(vec![
                ExecutionTarget::category("light"),
                ExecutionTarget::category("switch"),
            ]))
            .with_target(TargetRule::One(ExecutionTarget::ids(["a", "b"]).excluding()));

        assert!(exec.matches_resource(&resource("c", "light")));
        assert!(exec.matches_resource(&resource("c", "switch")));
        assert!(!exec.matches_resource(&resource("c", "sensor")));
        assert!(!exec.matches_resource(&resource("a", "light")));
    }

    #[test]
    fn test_target_rule_wire_forms() {
        let rules: Vec<TargetRule> = serde_json::from_value(json!([
            {"categories": "light"},
            [{"id": "a"}, {"tags": "x"}]
        ]))
        .unwrap();
        assert!(matches!(rules[0], TargetRule::One(_)));
        assert!(matches!(&rules[1], TargetRule::AnyOf(list) if list.len() == 2));
    }

    #[test]
    fn test_argument_schema_parsing() {
        let arg: ExecArgument = serde_json::from_value(json!({
            "type": "number", "name": "level", "label": "Level", "min": 0, "max": 100,
            "precision": 1, "required": true
        }))
        .unwrap();
        assert!(arg.required);
        assert_eq!(arg.name, "level");
        assert!(matches!(arg.kind, ExecArgumentKind::Number { precision: Some(1), .. }));
        assert!(matches!(arg.kind, ExecArgumentKind::Number { negatives: true, .. }));
        assert!(arg.validate(&json!(50)).is_ok());
        assert!(arg.validate(&json!(150)).is_err());
        assert!(arg.validate(&Value::Null).is_err());
        assert!(arg.validate(&json!("fifty")).is_err());
    }

    #[test]
    fn test_validate_arguments() {
        let exec = Executor::new("dim", "home", "switches", "Dim")
            .with_argument(
                ExecArgument::new(
                    "level",
                    ExecArgumentKind::Number {
                        prefix: None,
                        suffix: Some("%".into()),
                        min: Some(0.0),
                        max: Some(100.0),
                        negatives: false,
                        decimals: false,
                        precision: None,
                    },
                )
                .required(),
            )
            .with_argument(ExecArgument::new(
                "mode",
                ExecArgumentKind::Selection {
                    options: vec!["fade".into(), "snap".into()],
                    multiple: false,
                },
            ));

        let mut args = IndexMap::new();
        args.insert("level".to_string(), json!(40));
        assert!(exec.validate_arguments(&args).is_ok());

        args.insert("mode".to_string(), json!("blink"));
        assert!(exec.validate_arguments(&args).is_err());

        let mut unknown = IndexMap::new();
        unknown.insert("level".to_string(), json!(40));
        unknown.insert("speed".to_string(), json!(1));
        assert!(exec.validate_arguments(&unknown).is_err());

        assert!(exec.validate_arguments(&IndexMap::new()).is_err());
    }

    #[test]
    fn test_boolean_and_array_wire_fields() {
        let arguments: IndexMap<String, ExecArgument> = serde_json::from_value(json!({
            "on": {"type": "boolean", "name": "on"},
            "fancy": {"type": "boolean", "name": "fancy", "mode": "checkbox"},
            "tags": {"type": "array", "name": "tags", "suggestions": ["red", "blue"]}
        }))
        .unwrap();
        assert!(matches!(arguments["on"].kind, ExecArgumentKind::Boolean { mode: BooleanMode::Switch }));
        assert!(matches!(arguments["fancy"].kind, ExecArgumentKind::Boolean { mode: BooleanMode::Checkbox }));
        match &arguments["tags"].kind {
            ExecArgumentKind::Array { suggestions, max_values } => {
                assert_eq!(suggestions.as_deref(), Some(&["red".to_string(), "blue".to_string()][..]));
                assert_eq!(*max_values, None);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        let encoded = serde_json::to_value(&arguments["fancy"]).unwrap();
        assert_eq!(encoded["name"], "fancy");
        assert_eq!(encoded["mode"], "checkbox");
        assert_eq!(encoded["type"], "boolean");

        let nameless = serde_json::from_value::<ExecArgument>(json!({"type": "object"}));
        assert!(nameless.is_err());
    }
}
