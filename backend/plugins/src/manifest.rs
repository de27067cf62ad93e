/// Plugin manifest: describes a plugin package and the capabilities it exports.
///
/// Read from `manifest.json` at the root of each plugin folder.
use indexmap::IndexMap;
use raven_core::{RavenError, RavenResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A package the plugin needs. Informational only; installation happens
/// before the runtime starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDependency {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub cache: Option<bool>,
}

/// Where an export lives inside the plugin namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTarget {
    /// Dotted path of sub-namespaces; empty or absent means the root.
    #[serde(default)]
    pub import_path: Option<String>,
    pub member: String,
}

impl ExportTarget {
    /// Path segments with surrounding dots ignored.
    pub fn segments(&self) -> Vec<&str> {
        match self.import_path.as_deref().map(|p| p.trim_matches('.')) {
            Some(path) if !path.is_empty() => path.split('.').collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.import_path.as_deref().filter(|p| !p.is_empty()).unwrap_or(".");
        write!(f, "{path}:{}", self.member)
    }
}

/// An export argument: a literal, or a value taken from the lifecycle registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwargValue {
    Context { context: String },
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleExport {
    #[serde(flatten)]
    pub target: ExportTarget,
    pub context_key: String,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KwargsExport {
    #[serde(flatten)]
    pub target: ExportTarget,
    #[serde(default)]
    pub kwargs: IndexMap<String, KwargValue>,
}

impl Default for ExportTarget {
    fn default() -> Self {
        Self {
            import_path: None,
            member: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Lifecycle,
    Resource,
    Executor,
    Event,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lifecycle => "lifecycle",
            Self::Resource => "resource",
            Self::Executor => "executor",
            Self::Event => "event",
        })
    }
}

/// A declared capability, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExportDeclaration {
    Lifecycle(LifecycleExport),
    Resource(KwargsExport),
    Executor(KwargsExport),
    Event(KwargsExport),
}

impl ExportDeclaration {
    pub fn kind(&self) -> ExportKind {
        match self {
            Self::Lifecycle(_) => ExportKind::Lifecycle,
            Self::Resource(_) => ExportKind::Resource,
            Self::Executor(_) => ExportKind::Executor,
            Self::Event(_) => ExportKind::Event,
        }
    }

    pub fn target(&self) -> &ExportTarget {
        match self {
            Self::Lifecycle(export) => &export.target,
            Self::Resource(export) | Self::Executor(export) | Self::Event(export) => &export.target,
        }
    }

    /// Arguments for non-lifecycle exports.
    pub fn kwargs(&self) -> Option<&IndexMap<String, KwargValue>> {
        match self {
            Self::Lifecycle(_) => None,
            Self::Resource(export) | Self::Executor(export) | Self::Event(export) => {
                Some(&export.kwargs)
            }
        }
    }
}

/// Full plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,
    /// Name of the registered entry point providing this plugin's namespace.
    pub entrypoint: String,
    /// Declaration order is significant for lifecycle acquisition.
    #[serde(default)]
    pub exports: IndexMap<String, ExportDeclaration>,
}

impl PluginManifest {
    /// Read and validate `manifest.json` from a plugin folder.
    pub fn load(folder: &Path) -> RavenResult<Self> {
        let path = folder.join("manifest.json");
        let location = path.display().to_string();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| RavenError::manifest(&location, format!("unreadable: {e}")))?;
        let manifest: Self = serde_json::from_str(&raw)
            .map_err(|e| RavenError::manifest(&location, format!("malformed: {e}")))?;
        manifest.validate().map_err(|message| RavenError::manifest(&location, message))?;
        Ok(manifest)
    }

    /// Validate required fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.slug.is_empty() {
            return Err("missing 'slug'".into());
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(format!("slug '{}' may only contain [a-z0-9_-]", self.slug));
        }
        if self.name.is_empty() {
            return Err("missing 'name'".into());
        }
        if self.entrypoint.is_empty() {
            return Err("missing 'entrypoint'".into());
        }
        for (name, export) in &self.exports {
            if export.target().member.is_empty() {
                return Err(format!("export '{name}' has no member"));
            }
            if let ExportDeclaration::Lifecycle(lifecycle) = export {
                if lifecycle.context_key.is_empty() {
                    return Err(format!("lifecycle export '{name}' has no context_key"));
                }
            }
        }
        Ok(())
    }

    /// Exports of the given kinds, in declaration order. No kinds means all.
    pub fn exports_of(&self, kinds: &[ExportKind]) -> Vec<(&str, &ExportDeclaration)> {
        self.exports
            .iter()
            .filter(|(_, export)| kinds.is_empty() || kinds.contains(&export.kind()))
            .map(|(name, export)| (name.as_str(), export))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "slug": "home",
            "name": "Home",
            "dependencies": [{"name": "hass", "ref": "hass-client==1.2", "source": "pip"}],
            "entrypoint": "home",
            "exports": {
                "session": {"type": "lifecycle", "member": "session", "context_key": "http", "is_async": true},
                "lights": {
                    "type": "resource",
                    "import_path": "providers.lights",
                    "member": "list",
                    "kwargs": {"client": {"context": "http"}, "room": "kitchen"}
                },
                "switch": {"type": "executor", "member": "switches"},
                "watch": {"type": "event", "member": "watch"}
            }
        })
    }

    #[test]
    fn test_parse_manifest() {
        let manifest: PluginManifest = serde_json::from_value(sample()).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.dependencies[0].reference, "hass-client==1.2");

        let names: Vec<_> = manifest.exports.keys().collect();
        assert_eq!(names, vec!["session", "lights", "switch", "watch"]);

        match &manifest.exports["session"] {
            ExportDeclaration::Lifecycle(l) => {
                assert!(l.is_async);
                assert_eq!(l.context_key, "http");
            }
            other => panic!("unexpected {other:?}"),
        }

        let lights = &manifest.exports["lights"];
        assert_eq!(lights.kind(), ExportKind::Resource);
        assert_eq!(lights.target().segments(), vec!["providers", "lights"]);
        let kwargs = lights.kwargs().unwrap();
        assert_eq!(kwargs["client"], KwargValue::Context { context: "http".into() });
        assert_eq!(kwargs["room"], KwargValue::Literal("kitchen".into()));
    }

    #[test]
    fn test_declaration_order_survives_parsing() {
        let raw = r#"{
            "slug": "order",
            "name": "Order",
            "entrypoint": "order",
            "exports": {
                "zeta": {"type": "lifecycle", "member": "zeta", "context_key": "zeta"},
                "alpha": {"type": "lifecycle", "member": "alpha", "context_key": "alpha"}
            }
        }"#;
        let parsed: PluginManifest = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.exports.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);

        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        let through_value: PluginManifest = serde_json::from_value(value).unwrap();
        assert_eq!(through_value.exports.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_exports_of() {
        let manifest: PluginManifest = serde_json::from_value(sample()).unwrap();
        let picked = manifest.exports_of(&[ExportKind::Executor, ExportKind::Event]);
        assert_eq!(picked.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec!["switch", "watch"]);
        assert_eq!(manifest.exports_of(&[]).len(), 4);
    }

    #[test]
    fn test_unknown_export_type_rejected() {
        let mut raw = sample();
        raw["exports"]["bad"] = json!({"type": "widget", "member": "x"});
        assert!(serde_json::from_value::<PluginManifest>(raw).is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest: PluginManifest = serde_json::from_value(sample()).unwrap();
        manifest.slug = "Bad Slug".into();
        assert!(manifest.validate().is_err());
        manifest.slug = "ok".into();
        manifest.entrypoint.clear();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_target_segments_and_display() {
        let root = ExportTarget { import_path: Some(".".into()), member: "m".into() };
        assert!(root.segments().is_empty());
        assert_eq!(root.to_string(), ".:m");
        let nested = ExportTarget { import_path: Some(".a.b.".into()), member: "m".into() };
        assert_eq!(nested.segments(), vec!["a", "b"]);
    }
}
