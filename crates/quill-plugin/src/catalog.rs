//! Compiled-in plugin factories keyed by plugin id.
//!
//! The host registers every plugin it ships with at startup. Loading a
//! plugin pairs a manifest from the module store with the factory of the
//! same id.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quill_core::error::AppError;
use quill_core::result::AppResult;

use crate::plugin::Plugin;

/// Builds a fresh plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Table of plugin factories.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factory, replacing any previous one for the same id.
    pub fn register<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.insert(id, factory);
        self
    }

    /// Adds a factory in place.
    pub fn insert<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Whether a factory exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Ids of every registered factory, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Builds a new instance of plugin `id`.
    ///
    /// Fails when no factory is registered or when the instance reports a
    /// different id than it was registered under.
    pub fn instantiate(&self, id: &str) -> AppResult<Arc<dyn Plugin>> {
        let factory = self.factories.get(id).ok_or_else(|| {
            AppError::not_found(format!("No compiled-in plugin named '{id}'"))
        })?;

        let plugin = factory();
        if plugin.config().id != id {
            return Err(AppError::configuration(format!(
                "Plugin registered as '{id}' reports id '{}'",
                plugin.config().id
            )));
        }
        Ok(plugin)
    }
}
