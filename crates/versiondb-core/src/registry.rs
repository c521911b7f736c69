//! Strategy registry.
//!
//! Maps strategy names to version backends. Registration happens once at
//! startup; lookups happen on every `apply` call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::scheme::VersionBackend;
use crate::store::Store;

/// Name-keyed table of version backends for stores of type `S`.
///
/// Lookups take a shared lock and may run concurrently; registration takes
/// the exclusive lock.
pub struct Registry<S: Store> {
    backends: RwLock<HashMap<String, Arc<dyn VersionBackend<S>>>>,
}

impl<S: Store> Registry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
        }
    }

    /// Register `backend` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or a backend is already registered under
    /// `name`. Both are wiring mistakes, not runtime conditions.
    pub fn register(&self, name: impl Into<String>, backend: Arc<dyn VersionBackend<S>>) {
        let name = name.into();
        let mut backends = self.backends.write();

        if name.is_empty() {
            panic!("versiondb: register called with an empty strategy name");
        }
        if backends.contains_key(&name) {
            panic!("versiondb: register called twice for strategy {name:?}");
        }

        tracing::debug!(strategy = %name, "registered version backend");
        backends.insert(name, backend);
    }

    /// Look up the backend registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn VersionBackend<S>>> {
        self.backends.read().get(name).cloned()
    }

    /// Check whether a backend is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.read().contains_key(name)
    }

    /// Registered strategy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    /// Check whether no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }
}

impl<S: Store> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("strategies", &self.names())
            .finish()
    }
}
