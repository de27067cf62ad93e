/// Plugin catalog: entry points compiled into the host binary.
///
/// A manifest's `entrypoint` names one of these. Plugins are linked in
/// statically, so the catalog is filled by the binary before discovery runs.
use std::collections::HashMap;

use tracing::debug;

use crate::sdk::{Entrypoint, Namespace};

#[derive(Default, Clone)]
pub struct PluginCatalog {
    entrypoints: HashMap<String, Entrypoint>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entrypoint` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, entrypoint: Entrypoint) {
        let name = name.into();
        debug!("[Plugins] Catalog entry: {}", name);
        self.entrypoints.insert(name, entrypoint);
    }

    pub fn with(mut self, name: impl Into<String>, entrypoint: Entrypoint) -> Self {
        self.register(name, entrypoint);
        self
    }

    /// Build the namespace exposed by `name`.
    pub fn load(&self, name: &str) -> Option<Namespace> {
        self.entrypoints.get(name).map(|entrypoint| entrypoint())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entrypoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Namespace {
        Namespace::new()
    }

    fn nested() -> Namespace {
        Namespace::new().with_namespace("inner", Namespace::new())
    }

    #[test]
    fn test_load_builds_registered_namespace() {
        let catalog = PluginCatalog::new().with("b", nested).with("a", empty);
        assert_eq!(catalog.names(), vec!["a", "b"]);
        assert!(catalog.load("a").unwrap().is_empty());
        assert_eq!(catalog.load("b").unwrap().len(), 1);
        assert!(catalog.load("missing").is_none());
    }
}
