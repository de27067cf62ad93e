//! Hierarchical, wildcard-aware authorization.

pub mod glob;
pub mod principal;
pub mod scope;

pub use glob::{glob_match, glob_matches};
pub use principal::User;
pub use scope::{core_scope_spec, MinimalScope, Scope, ScopeTree, DEFAULT_SCOPES, PLUGIN_SCOPE_BRANCH};
