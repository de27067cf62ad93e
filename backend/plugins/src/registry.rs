/// Plugin registry: discovers plugin folders and binds their exports.
///
/// Discovery is sequential and deterministic: folders are visited in
/// lexicographic order and that order is the plugin discovery order used
/// for lifecycle acquisition.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use raven_core::{RavenError, RavenResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::PluginCatalog;
use crate::lifecycle::LifecycleRecord;
use crate::manifest::{ExportKind, PluginManifest};
use crate::resolver::{ResolvedExport, resolve};
use crate::sdk::Namespace;

/// A loaded plugin with its exports bound.
pub struct Plugin {
    pub folder: PathBuf,
    pub manifest: PluginManifest,
    exports: IndexMap<String, ResolvedExport>,
    unresolved: Vec<RavenError>,
}

impl Plugin {
    /// Bind every export of `manifest` against `namespace`.
    ///
    /// An export that fails to resolve is dropped and recorded, except for
    /// lifecycle exports: those abort the load.
    pub fn bind(folder: PathBuf, manifest: PluginManifest, namespace: &Namespace) -> RavenResult<Self> {
        let mut exports = IndexMap::new();
        let mut unresolved = Vec::new();

        for (name, declaration) in &manifest.exports {
            match resolve(&manifest.slug, name, declaration, namespace) {
                Ok(resolved) => {
                    exports.insert(name.clone(), resolved);
                }
                Err(e) if declaration.kind() == ExportKind::Lifecycle => {
                    return Err(e);
                }
                Err(e) => {
                    warn!("[Plugins] {}: export '{}' skipped: {}", manifest.slug, name, e);
                    unresolved.push(e);
                }
            }
        }

        Ok(Self { folder, manifest, exports, unresolved })
    }

    pub fn slug(&self) -> &str {
        &self.manifest.slug
    }

    pub fn export(&self, name: &str) -> Option<&ResolvedExport> {
        self.exports.get(name)
    }

    /// Resolved exports in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &ResolvedExport)> {
        self.exports.iter().map(|(name, export)| (name.as_str(), export))
    }

    /// Exports that failed to resolve.
    pub fn unresolved(&self) -> &[RavenError] {
        &self.unresolved
    }

    /// This plugin's lifecycle entries in declaration order.
    pub fn lifecycle_records(&self, settings: &Value) -> Vec<LifecycleRecord> {
        self.exports
            .values()
            .filter_map(|export| match export {
                ResolvedExport::Lifecycle { declaration, provider } => Some(LifecycleRecord {
                    plugin: self.manifest.slug.clone(),
                    context_key: declaration.context_key.clone(),
                    provider: provider.clone(),
                    settings: settings.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// All loaded plugins, in discovery order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `plugins_dir` and load every folder holding a `manifest.json`.
    ///
    /// Any manifest problem is fatal, including an entrypoint missing from
    /// `catalog` and a slug claimed by two folders.
    pub fn discover(plugins_dir: &Path, catalog: &PluginCatalog) -> RavenResult<Self> {
        let mut registry = Self::new();
        if !plugins_dir.is_dir() {
            warn!("[Plugins] Plugins directory {:?} does not exist", plugins_dir);
            return Ok(registry);
        }

        let entries = std::fs::read_dir(plugins_dir).map_err(|e| {
            RavenError::manifest(plugins_dir.display().to_string(), format!("unreadable: {e}"))
        })?;
        let mut folders: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();

        for folder in folders {
            if !folder.join("manifest.json").is_file() {
                debug!("[Plugins] Skipping {:?}: no manifest.json", folder);
                continue;
            }
            let manifest = PluginManifest::load(&folder)?;
            let namespace = catalog.load(&manifest.entrypoint).ok_or_else(|| {
                RavenError::manifest(
                    folder.display().to_string(),
                    format!("unknown entrypoint '{}'", manifest.entrypoint),
                )
            })?;
            let plugin = Plugin::bind(folder, manifest, &namespace)?;
            info!(
                "[Plugins] Loaded: {} ({} exports, {} unresolved)",
                plugin.slug(),
                plugin.exports.len(),
                plugin.unresolved.len()
            );
            registry.insert(plugin)?;
        }

        Ok(registry)
    }

    /// Add a plugin. Slugs are unique.
    pub fn insert(&mut self, plugin: Plugin) -> RavenResult<()> {
        if let Some(existing) = self.plugins.get(plugin.slug()) {
            return Err(RavenError::manifest(
                plugin.folder.display().to_string(),
                format!(
                    "slug '{}' already used by {}",
                    plugin.slug(),
                    existing.folder.display()
                ),
            ));
        }
        self.plugins.insert(plugin.slug().to_string(), plugin);
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&Plugin> {
        self.plugins.get(slug)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    pub fn manifests(&self) -> Vec<&PluginManifest> {
        self.plugins.values().map(|p| &p.manifest).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Every lifecycle entry: discovery order, then declaration order.
    pub fn lifecycle_records(&self, settings: &HashMap<String, Value>) -> Vec<LifecycleRecord> {
        let empty = Value::Object(Default::default());
        self.plugins
            .values()
            .flat_map(|plugin| {
                plugin.lifecycle_records(settings.get(plugin.slug()).unwrap_or(&empty))
            })
            .collect()
    }
}
