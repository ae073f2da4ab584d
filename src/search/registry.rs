//! Backend Registry
//!
//! Process-wide table of backend factories keyed by short name. The
//! built-in backends are present from first use; additional factories are
//! registered at startup, before queries are served.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::backend::{Backend, Options};
use super::error::{SearchError, SearchResult};

/// Creates a backend from its option mapping
pub type Factory = Arc<dyn Fn(&Options) -> SearchResult<Arc<dyn Backend>> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, Factory>>> = Lazy::new(|| {
    let mut table: HashMap<String, Factory> = HashMap::new();
    table.insert(crate::fake::NAME.to_string(), Arc::new(crate::fake::factory));
    table.insert(crate::peer::NAME.to_string(), Arc::new(crate::peer::factory));
    table.insert(crate::mux::NAME.to_string(), Arc::new(crate::mux::factory));
    RwLock::new(table)
});

/// Register a factory under `name`; `None` removes the entry
pub fn register(name: &str, factory: Option<Factory>) {
    let mut table = REGISTRY.write();
    match factory {
        Some(f) => {
            tracing::debug!(backend = %name, "backend registered");
            table.insert(name.to_string(), f);
        }
        None => {
            tracing::debug!(backend = %name, "backend removed");
            table.remove(name);
        }
    }
}

/// Instantiate a registered backend
pub fn create(name: &str, options: &Options) -> SearchResult<Arc<dyn Backend>> {
    let factory = REGISTRY
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| SearchError::UnknownBackend(name.to_string()))?;

    // the lock is released before the factory runs, factories may recurse
    factory(options)
}

/// Sorted names of every registered backend
pub fn available_backends() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}
