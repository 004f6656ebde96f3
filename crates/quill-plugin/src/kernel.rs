//! Kernel: composition root wiring the event manager, hook registry, route
//! bridge and lifecycle manager from configuration.
//!
//! One kernel is built per process and shared by reference; there is no
//! global instance.

use std::sync::Arc;

use quill_core::config::AppConfig;
use quill_core::stores::{MemorySettingsStore, StaticPluginSource};
use quill_core::traits::{PluginSource, SettingsStore};

use crate::catalog::PluginCatalog;
use crate::events::manager::EventManager;
use crate::hooks::registry::HookRegistry;
use crate::manager::PluginManager;
use crate::routes::bridge::RouteBridge;

/// The assembled extensibility kernel.
#[derive(Debug, Clone)]
pub struct Kernel {
    /// Shared event manager.
    pub events: Arc<EventManager>,
    /// Shared hook registry.
    pub hooks: Arc<HookRegistry>,
    /// Plugin route table.
    pub routes: Arc<RouteBridge>,
    /// Lifecycle manager.
    pub manager: Arc<PluginManager>,
}

impl Kernel {
    /// Starts building a kernel from configuration.
    pub fn builder(config: &AppConfig) -> KernelBuilder {
        KernelBuilder {
            config: config.clone(),
            catalog: PluginCatalog::new(),
            settings: None,
            source: None,
        }
    }
}

/// Builder for [`Kernel`].
#[derive(Debug)]
pub struct KernelBuilder {
    config: AppConfig,
    catalog: PluginCatalog,
    settings: Option<Arc<dyn SettingsStore>>,
    source: Option<Arc<dyn PluginSource>>,
}

impl KernelBuilder {
    /// Sets the compiled-in plugin catalog.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the settings store. Defaults to an in-memory store.
    pub fn settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the module/config store. Defaults to the `plugins.modules`
    /// section of the configuration.
    pub fn plugin_source(mut self, source: Arc<dyn PluginSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Wires everything together.
    pub fn build(self) -> Kernel {
        let events = Arc::new(EventManager::new(&self.config.events));
        let hooks = Arc::new(HookRegistry::with_timeout(
            self.config.events.handler_timeout(),
        ));
        let routes = Arc::new(RouteBridge::new(&self.config.plugins.route_prefix));

        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(MemorySettingsStore::new()));
        let source = self.source.unwrap_or_else(|| {
            Arc::new(StaticPluginSource::new(self.config.plugins.modules.clone()))
        });

        let manager = PluginManager::new(
            events.clone(),
            hooks.clone(),
            routes.clone(),
            settings,
            source,
            self.catalog,
        )
        .with_auto_activate(self.config.plugins.auto_activate);

        Kernel {
            events,
            hooks,
            routes,
            manager: Arc::new(manager),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_from_defaults() {
        let kernel = Kernel::builder(&AppConfig::default()).build();
        assert_eq!(kernel.routes.prefix(), "/plugins");
        assert_eq!(kernel.events.total_listener_count().await, 0);

        let report = kernel.manager.refresh_plugins().await.unwrap();
        assert_eq!(report.loaded.len(), 0);
        assert!(kernel.manager.list_plugins().await.is_empty());
    }
}
