//! Static permission catalog.
//!
//! The tree is built once at boot from [`core_scope_spec`] and then extended
//! with one node per loaded plugin under [`PLUGIN_SCOPE_BRANCH`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Branch under which every plugin gets its own subtree, named by slug.
pub const PLUGIN_SCOPE_BRANCH: &str = "resources.plugin";

/// Scopes granted to newly created users.
pub const DEFAULT_SCOPES: [&str; 5] = [
    "admin.users.view.basic",
    "admin.users.view.groups",
    "admin.groups.view.basic",
    "resources.all.view",
    "pipelines.view",
];

/// Compact description of a scope subtree, as written in the static catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimalScope {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub children: IndexMap<String, MinimalScope>,
}

static CORE_SCOPE: Lazy<IndexMap<String, MinimalScope>> = Lazy::new(|| {
    let leaf = |name: &str| serde_json::json!({ "display_name": name });
    let spec = serde_json::json!({
        "admin": {
            "display_name": "Administration",
            "children": {
                "users": {
                    "display_name": "User Management",
                    "children": {
                        "view": {
                            "display_name": "View",
                            "children": {
                                "basic": leaf("Basic"),
                                "groups": leaf("Groups"),
                                "scopes": leaf("Scopes"),
                            }
                        },
                        "manage": {
                            "display_name": "Manage",
                            "children": {
                                "create": leaf("Create"),
                                "delete": leaf("Delete"),
                                "edit": {
                                    "display_name": "Edit",
                                    "children": {
                                        "basic": leaf("Basic"),
                                        "groups": leaf("Groups"),
                                        "scopes": leaf("Scopes"),
                                    }
                                }
                            }
                        }
                    }
                },
                "groups": {
                    "display_name": "Group Management",
                    "children": {
                        "view": {
                            "display_name": "View",
                            "children": {
                                "basic": leaf("Basic"),
                                "scopes": leaf("Scopes"),
                            }
                        },
                        "manage": {
                            "display_name": "Manage",
                            "children": {
                                "create": leaf("Create"),
                                "delete": leaf("Delete"),
                                "edit": {
                                    "display_name": "Edit",
                                    "children": {
                                        "basic": leaf("Basic"),
                                        "scopes": leaf("Scopes"),
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
        "resources": {
            "display_name": "Resources",
            "children": {
                "all": {
                    "display_name": "All Resources",
                    "children": {
                        "view": leaf("View"),
                        "execute": leaf("Execute"),
                    }
                },
                "plugin": leaf("Plugin-Specific"),
            }
        },
        "pipelines": {
            "display_name": "Pipelines",
            "children": {
                "view": leaf("View"),
                "manage": leaf("Manage"),
            }
        }
    });
    serde_json::from_value(spec).expect("core scope catalog is well-formed")
});

/// The built-in permission catalog.
pub fn core_scope_spec() -> &'static IndexMap<String, MinimalScope> {
    &CORE_SCOPE
}

/// A node in the permission tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    /// Dotted path of the parent, `None` for top-level nodes and the root.
    pub parent: Option<String>,
    pub display_name: Option<String>,
    pub children: IndexMap<String, Scope>,
}

impl Scope {
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            display_name,
            children: IndexMap::new(),
        }
    }

    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.id),
            None => self.id.clone(),
        }
    }

    fn from_spec(id: &str, spec: &MinimalScope, parent: Option<&str>) -> Self {
        let path = match parent {
            Some(parent) => format!("{parent}.{id}"),
            None => id.to_string(),
        };
        let children = spec
            .children
            .iter()
            .map(|(key, child)| (key.clone(), Scope::from_spec(key, child, Some(&path))))
            .collect();
        Self {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            display_name: spec.display_name.clone(),
            children,
        }
    }

    /// Re-root this node and its descendants under `parent`.
    fn reparent(&mut self, parent: Option<String>) {
        self.parent = parent;
        let path = self.path();
        for child in self.children.values_mut() {
            child.reparent(Some(path.clone()));
        }
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        for child in self.children.values() {
            out.push(child.path());
            child.collect_paths(out);
        }
    }
}

/// The permission tree, rooted at a synthetic `root` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeTree {
    root: Scope,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::from_spec(core_scope_spec())
    }
}

impl ScopeTree {
    pub fn from_spec(spec: &IndexMap<String, MinimalScope>) -> Self {
        let mut root = Scope::new("root", None);
        for (key, child) in spec {
            root.children.insert(key.clone(), Scope::from_spec(key, child, None));
        }
        Self { root }
    }

    /// Core catalog extended with one node per plugin under [`PLUGIN_SCOPE_BRANCH`].
    pub fn with_plugins<'a, I>(plugins: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut tree = Self::default();
        for (slug, name) in plugins {
            let node = Scope::new(slug, Some(name.to_string()));
            if !tree.add_scope(PLUGIN_SCOPE_BRANCH, node) {
                warn!(plugin = %slug, "Plugin scope branch is missing from the catalog");
            }
        }
        tree
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// Look up a node by dotted path. The empty path is the root.
    pub fn get(&self, path: &str) -> Option<&Scope> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.')
            .try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Scope> {
        if path.is_empty() {
            return Some(&mut self.root);
        }
        path.split('.')
            .try_fold(&mut self.root, |node, segment| node.children.get_mut(segment))
    }

    /// Attach `scope` as a child of the node at `path` (empty path = top level).
    /// Returns false if the parent does not exist.
    pub fn add_scope(&mut self, path: &str, mut scope: Scope) -> bool {
        let Some(parent) = self.get_mut(path) else {
            return false;
        };
        scope.reparent((!path.is_empty()).then(|| path.to_string()));
        debug!(path = %scope.path(), "Scope added");
        parent.children.insert(scope.id.clone(), scope);
        true
    }

    /// Every path in the tree, depth-first in catalog order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_paths(&mut out);
        out
    }
}
