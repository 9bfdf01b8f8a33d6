//! Provider registry
//!
//! Maps a scheme string to the factory that builds its provider. Each
//! provider is instantiated on first resolve and cached for the lifetime of
//! the registry.

use crate::error::{VfsError, VfsResult};
use crate::name::{Name, DEFAULT_SCHEME};
use crate::provider::FileProvider;
use crate::vfs::Vfs;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds a provider. The `Vfs` handle lets container providers reach
/// other schemes; keep only a weak handle (`Vfs::downgrade`) to it.
pub type ProviderFactory = Arc<dyn Fn(&Vfs) -> Arc<dyn FileProvider> + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

struct Entry {
    factory: ProviderFactory,
    instance: OnceCell<Arc<dyn FileProvider>>,
}

/// Scheme → provider registry.
///
/// Registration policy: the first registration of a scheme wins. A second
/// `register` for the same scheme is rejected, logged and returns `false`.
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry used by `Vfs::global()`
    pub fn global() -> &'static Arc<Registry> {
        &GLOBAL_REGISTRY
    }

    /// Register a factory for `scheme`.
    ///
    /// Returns `false` when the scheme is already registered; the existing
    /// factory is kept.
    pub fn register<F>(&self, scheme: &str, factory: F) -> bool
    where
        F: Fn(&Vfs) -> Arc<dyn FileProvider> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        if entries.contains_key(scheme) {
            warn!(target: "skein::registry", scheme, "Rejected duplicate provider registration");
            return false;
        }
        entries.insert(
            scheme.to_string(),
            Arc::new(Entry {
                factory: Arc::new(factory),
                instance: OnceCell::new(),
            }),
        );
        debug!(target: "skein::registry", scheme, "Registered provider");
        true
    }

    /// Remove a scheme and its cached instance
    pub fn unregister(&self, scheme: &str) -> bool {
        self.entries.write().remove(scheme).is_some()
    }

    /// Check if a scheme is registered
    pub fn contains(&self, scheme: &str) -> bool {
        self.entries.read().contains_key(scheme)
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.entries.read().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Get the number of registered schemes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Resolve the provider for a name's scheme.
    ///
    /// An unregistered scheme is a configuration error
    /// ([`VfsError::UnknownScheme`], fatal). An empty scheme means `file`.
    pub fn resolve(self: &Arc<Self>, name: &Name) -> VfsResult<Arc<dyn FileProvider>> {
        let scheme = if name.scheme().is_empty() {
            DEFAULT_SCHEME
        } else {
            name.scheme()
        };
        self.resolve_scheme(scheme)
    }

    /// Resolve the provider registered for `scheme`.
    pub fn resolve_scheme(self: &Arc<Self>, scheme: &str) -> VfsResult<Arc<dyn FileProvider>> {
        let entry = self
            .entries
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| VfsError::UnknownScheme(scheme.to_string()))?;

        let provider = entry.instance.get_or_init(|| {
            debug!(target: "skein::registry", scheme, "Instantiating provider");
            (entry.factory)(&Vfs::new(Arc::clone(self)))
        });
        Ok(Arc::clone(provider))
    }

    /// Providers instantiated so far, keyed by scheme
    pub fn instances(&self) -> Vec<(String, Arc<dyn FileProvider>)> {
        let entries = self.entries.read();
        let mut out: Vec<(String, Arc<dyn FileProvider>)> = entries
            .iter()
            .filter_map(|(scheme, entry)| {
                entry
                    .instance
                    .get()
                    .map(|p| (scheme.clone(), Arc::clone(p)))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
