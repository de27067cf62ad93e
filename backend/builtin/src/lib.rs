//! Plugins bundled with the Raven daemon.

pub mod host;

use raven_plugins::PluginCatalog;

/// Register every bundled entry point.
pub fn register(catalog: &mut PluginCatalog) {
    catalog.register(host::ENTRYPOINT, host::namespace);
}

/// A catalog holding only the bundled plugins.
pub fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    register(&mut catalog);
    catalog
}
