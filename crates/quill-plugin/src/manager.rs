//! Plugin manager: lifecycle management for all plugins.
//!
//! Guarantees that a plugin's listeners, hook entries and routes exist only
//! while it is active:
//!
//! - activation is all-or-nothing: if `register_hooks`, route mounting or
//!   `on_activate` fails, everything registered under the plugin id is
//!   revoked and the plugin is marked `error`
//! - deactivation revokes registrations before `on_deactivate` runs, so a
//!   failing teardown cannot leave registrations behind
//!
//! Transitions are serialized by a lifecycle lock. Lifecycle events are
//! emitted after the lock is released so listeners may call back into the
//! manager.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use quill_core::error::{AppError, ErrorKind};
use quill_core::events::{SYSTEM_SOURCE, plugin};
use quill_core::result::AppResult;
use quill_core::traits::{PluginSource, SettingsStore};

use crate::api::context::PluginContext;
use crate::api::registrar::PluginRegistrar;
use crate::catalog::PluginCatalog;
use crate::events::manager::EventManager;
use crate::guard::guarded;
use crate::hooks::registry::HookRegistry;
use crate::registry::{PluginInstance, PluginRegistry, PluginStatus, PluginSummary};
use crate::routes::bridge::RouteBridge;
use crate::settings::missing_required;

/// Lifecycle event waiting to be emitted once the lock is released.
type PendingEvent = (&'static str, Value);

/// What a refresh did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Number of instances discarded before reloading.
    pub unloaded: usize,
    /// Plugins loaded from the module store.
    pub loaded: Vec<String>,
    /// Plugins activated after loading.
    pub activated: Vec<String>,
    /// Disabled manifests that were not loaded.
    pub skipped: Vec<String>,
    /// Plugins that failed to load or activate.
    pub failed: Vec<RefreshFailure>,
}

/// One failure recorded during a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshFailure {
    /// The plugin concerned.
    pub plugin_id: String,
    /// Error message.
    pub error: String,
}

/// Registrations made by one successful activation.
struct Activation {
    listeners: usize,
    hooks: usize,
    routes: usize,
}

/// Manages the full lifecycle of plugins: load, activate, deactivate,
/// refresh, uninstall.
#[derive(Debug)]
pub struct PluginManager {
    /// Loaded instances.
    registry: Arc<PluginRegistry>,
    /// Shared event manager.
    events: Arc<EventManager>,
    /// Shared hook registry.
    hooks: Arc<HookRegistry>,
    /// Plugin route table.
    routes: Arc<RouteBridge>,
    /// Per-plugin settings collaborator.
    settings: Arc<dyn SettingsStore>,
    /// Module/config store collaborator.
    source: Arc<dyn PluginSource>,
    /// Compiled-in plugin factories.
    catalog: PluginCatalog,
    /// Activate manifests marked `active` on refresh.
    auto_activate: bool,
    /// Serializes lifecycle transitions.
    transitions: Mutex<()>,
}

impl PluginManager {
    /// Creates a new plugin manager over shared kernel services.
    pub fn new(
        events: Arc<EventManager>,
        hooks: Arc<HookRegistry>,
        routes: Arc<RouteBridge>,
        settings: Arc<dyn SettingsStore>,
        source: Arc<dyn PluginSource>,
        catalog: PluginCatalog,
    ) -> Self {
        Self {
            registry: Arc::new(PluginRegistry::new()),
            events,
            hooks,
            routes,
            settings,
            source,
            catalog,
            auto_activate: true,
            transitions: Mutex::new(()),
        }
    }

    /// Sets whether refresh activates manifests marked `active`.
    pub fn with_auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }

    /// Loads a plugin from its manifest without registering anything.
    pub async fn load_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.transitions.lock().await;
            self.load_locked(plugin_id, &mut pending).await
        };
        self.emit_pending(pending).await;
        result
    }

    /// Activates a loaded, inactive or errored plugin.
    pub async fn activate(&self, plugin_id: &str) -> AppResult<()> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.transitions.lock().await;
            self.activate_locked(plugin_id, &mut pending).await
        };
        self.emit_pending(pending).await;
        result
    }

    /// Deactivates an active plugin.
    pub async fn deactivate(&self, plugin_id: &str) -> AppResult<()> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.transitions.lock().await;
            self.deactivate_locked(plugin_id, &mut pending).await
        };
        self.emit_pending(pending).await;
        result
    }

    /// Deactivates and discards every plugin, then reloads from the module
    /// store, activating manifests marked `active` when auto-activation is on.
    ///
    /// Per-plugin failures are collected in the report; only a failing
    /// module store aborts the refresh.
    pub async fn refresh_plugins(&self) -> AppResult<RefreshReport> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.transitions.lock().await;
            self.refresh_locked(&mut pending).await
        };
        self.emit_pending(pending).await;
        result
    }

    /// Deactivates a plugin if needed and discards its instance.
    pub async fn uninstall(&self, plugin_id: &str) -> AppResult<()> {
        let mut pending = Vec::new();
        let result = {
            let _guard = self.transitions.lock().await;
            self.uninstall_locked(plugin_id, &mut pending).await
        };
        self.emit_pending(pending).await;
        result
    }

    /// Deactivates every active plugin. Instances stay loaded.
    pub async fn shutdown(&self) {
        let mut pending = Vec::new();
        {
            let _guard = self.transitions.lock().await;
            for id in self.registry.ids_with_status(PluginStatus::Active).await {
                if let Err(e) = self.deactivate_locked(&id, &mut pending).await {
                    error!(plugin_id = %id, error = %e, "Error deactivating plugin during shutdown");
                }
            }
        }
        self.emit_pending(pending).await;
        info!("All plugins deactivated");
    }

    /// Status badges of every loaded plugin, in load order.
    pub async fn list_plugins(&self) -> Vec<PluginSummary> {
        self.registry.list().await
    }

    /// Status of one plugin.
    pub async fn status(&self, plugin_id: &str) -> Option<PluginStatus> {
        self.registry.status(plugin_id).await
    }

    /// Builds the context a loaded plugin receives.
    pub async fn plugin_context(&self, plugin_id: &str) -> AppResult<PluginContext> {
        let instance = self.instance(plugin_id).await?;
        Ok(self.context_for(&instance))
    }

    /// Returns the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Returns the event manager.
    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Returns the hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Returns the route bridge.
    pub fn routes(&self) -> &Arc<RouteBridge> {
        &self.routes
    }

    /// Returns the settings store.
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Returns the plugin catalog.
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    // ── Transitions (lifecycle lock held) ──

    async fn load_locked(&self, plugin_id: &str, pending: &mut Vec<PendingEvent>) -> AppResult<()> {
        if self.registry.contains(plugin_id).await {
            return Err(AppError::conflict(format!(
                "Plugin '{plugin_id}' is already loaded"
            )));
        }

        let manifest = self.source.manifest(plugin_id).await?;
        if !manifest.enabled {
            return Err(AppError::conflict(format!(
                "Plugin '{plugin_id}' is disabled"
            )));
        }

        let plugin = self.catalog.instantiate(plugin_id)?;

        for (key, value) in &manifest.settings {
            if self.settings.get(plugin_id, key).await?.is_none() {
                self.settings.set(plugin_id, key, value.clone()).await?;
            }
        }

        let version = plugin.config().version.clone();
        self.registry
            .insert(PluginInstance {
                plugin,
                manifest,
                status: PluginStatus::Loaded,
                error: None,
                loaded_at: Utc::now(),
                activated_at: None,
                gate: Default::default(),
            })
            .await?;

        info!(plugin_id = %plugin_id, version = %version, "Plugin loaded");
        pending.push((
            plugin::LOADED,
            json!({ "plugin_id": plugin_id, "version": version }),
        ));
        Ok(())
    }

    async fn activate_locked(
        &self,
        plugin_id: &str,
        pending: &mut Vec<PendingEvent>,
    ) -> AppResult<()> {
        let instance = self.instance(plugin_id).await?;
        if !instance.status.can_activate() {
            return Err(AppError::conflict(format!(
                "Plugin '{plugin_id}' cannot be activated from status '{}'",
                instance.status
            )));
        }

        let ctx = self.context_for(&instance);
        match self.try_activate(&instance, &ctx).await {
            Ok(activation) => {
                self.registry
                    .set_status(plugin_id, PluginStatus::Active, None)
                    .await?;

                info!(
                    plugin_id = %plugin_id,
                    listeners = activation.listeners,
                    hooks = activation.hooks,
                    routes = activation.routes,
                    "Plugin activated"
                );
                pending.push((
                    plugin::ACTIVATED,
                    json!({
                        "plugin_id": plugin_id,
                        "listeners": activation.listeners,
                        "hooks": activation.hooks,
                        "routes": activation.routes,
                    }),
                ));
                Ok(())
            }
            Err(e) => {
                let revoked = self.revoke_registrations(&instance).await;
                error!(
                    plugin_id = %plugin_id,
                    error = %e,
                    revoked,
                    "Plugin activation failed; registrations rolled back"
                );
                self.fail(plugin_id, "activate", &e, pending).await?;
                Err(AppError::with_source(
                    ErrorKind::Plugin,
                    format!("Plugin '{plugin_id}' failed to activate: {}", e.message),
                    e,
                ))
            }
        }
    }

    async fn try_activate(
        &self,
        instance: &PluginInstance,
        ctx: &PluginContext,
    ) -> AppResult<Activation> {
        let plugin = &instance.plugin;
        let plugin_id = instance.id();

        let stored = self.settings.all(plugin_id).await?;
        let missing = missing_required(&plugin.config().settings, &stored);
        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        instance.gate.open();
        let mut registrar = PluginRegistrar::new(ctx.clone());
        guarded(plugin.register_hooks(&mut registrar), None)
            .await
            .map_err(AppError::from)?;

        let routes = self.routes.mount(ctx, plugin.routes()).await?;

        guarded(plugin.on_activate(ctx), None)
            .await
            .map_err(AppError::from)?;

        Ok(Activation {
            listeners: registrar.listener_count(),
            hooks: registrar.hook_count(),
            routes,
        })
    }

    async fn deactivate_locked(
        &self,
        plugin_id: &str,
        pending: &mut Vec<PendingEvent>,
    ) -> AppResult<()> {
        let instance = self.instance(plugin_id).await?;
        if instance.status != PluginStatus::Active {
            return Err(AppError::conflict(format!(
                "Plugin '{plugin_id}' is not active (status '{}')",
                instance.status
            )));
        }

        let revoked = self.revoke_registrations(&instance).await;

        let ctx = self.context_for(&instance);
        match guarded(instance.plugin.on_deactivate(&ctx), None).await {
            Ok(()) => {
                self.registry
                    .set_status(plugin_id, PluginStatus::Inactive, None)
                    .await?;
                info!(plugin_id = %plugin_id, revoked, "Plugin deactivated");
                pending.push((plugin::DEACTIVATED, json!({ "plugin_id": plugin_id })));
                Ok(())
            }
            Err(failure) => {
                let e = AppError::from(failure);
                warn!(
                    plugin_id = %plugin_id,
                    error = %e,
                    "Plugin on_deactivate failed; registrations already revoked"
                );
                self.fail(plugin_id, "deactivate", &e, pending).await?;
                Err(AppError::with_source(
                    ErrorKind::Plugin,
                    format!("Plugin '{plugin_id}' failed to deactivate: {}", e.message),
                    e,
                ))
            }
        }
    }

    async fn refresh_locked(&self, pending: &mut Vec<PendingEvent>) -> AppResult<RefreshReport> {
        let mut report = RefreshReport::default();

        for id in self.registry.ids_with_status(PluginStatus::Active).await {
            if let Err(e) = self.deactivate_locked(&id, pending).await {
                warn!(plugin_id = %id, error = %e, "Deactivation failed during refresh");
            }
        }

        for instance in self.registry.clear().await {
            self.revoke_registrations(&instance).await;
            report.unloaded += 1;
        }

        let manifests = self.source.manifests().await?;
        info!(manifests = manifests.len(), "Reloading plugins");

        for manifest in manifests {
            let id = manifest.id.clone();
            if !manifest.enabled {
                report.skipped.push(id);
                continue;
            }

            if let Err(e) = self.load_locked(&id, pending).await {
                error!(plugin_id = %id, error = %e, "Plugin failed to load");
                report.failed.push(RefreshFailure {
                    plugin_id: id,
                    error: e.to_string(),
                });
                continue;
            }
            report.loaded.push(id.clone());

            if self.auto_activate && manifest.active {
                match self.activate_locked(&id, pending).await {
                    Ok(()) => report.activated.push(id),
                    Err(e) => report.failed.push(RefreshFailure {
                        plugin_id: id,
                        error: e.to_string(),
                    }),
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            activated = report.activated.len(),
            failed = report.failed.len(),
            "Plugins refreshed"
        );
        Ok(report)
    }

    async fn uninstall_locked(
        &self,
        plugin_id: &str,
        pending: &mut Vec<PendingEvent>,
    ) -> AppResult<()> {
        let instance = self.instance(plugin_id).await?;

        if instance.status == PluginStatus::Active {
            if let Err(e) = self.deactivate_locked(plugin_id, pending).await {
                warn!(plugin_id = %plugin_id, error = %e, "Uninstalling after failed deactivation");
            }
        }

        self.revoke_registrations(&instance).await;
        self.registry.remove(plugin_id).await;

        info!(plugin_id = %plugin_id, "Plugin uninstalled");
        pending.push((plugin::UNINSTALLED, json!({ "plugin_id": plugin_id })));
        Ok(())
    }

    // ── Helpers ──

    async fn instance(&self, plugin_id: &str) -> AppResult<PluginInstance> {
        self.registry
            .get(plugin_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Plugin '{plugin_id}' is not loaded")))
    }

    fn context_for(&self, instance: &PluginInstance) -> PluginContext {
        PluginContext::new(
            instance.id(),
            self.events.clone(),
            self.hooks.clone(),
            self.settings.clone(),
            instance.plugin.config().settings.clone(),
        )
        .with_gate(instance.gate.clone())
    }

    /// Closes the plugin's registration gate, then removes every listener,
    /// hook entry and route it owns.
    async fn revoke_registrations(&self, instance: &PluginInstance) -> usize {
        instance.gate.close();
        let plugin_id = instance.id();
        let listeners = self.events.remove_plugin_listeners(plugin_id).await;
        let hooks = self.hooks.unregister_plugin(plugin_id).await;
        let routes = self.routes.unmount(plugin_id).await;
        listeners + hooks + routes
    }

    async fn fail(
        &self,
        plugin_id: &str,
        phase: &str,
        e: &AppError,
        pending: &mut Vec<PendingEvent>,
    ) -> AppResult<()> {
        self.registry
            .set_status(plugin_id, PluginStatus::Error, Some(e.message.clone()))
            .await?;
        pending.push((
            plugin::ERROR,
            json!({ "plugin_id": plugin_id, "phase": phase, "error": e.message }),
        ));
        Ok(())
    }

    async fn emit_pending(&self, pending: Vec<PendingEvent>) {
        for (event_type, data) in pending {
            if let Err(e) = self
                .events
                .emit_event(event_type, data, SYSTEM_SOURCE, None)
                .await
            {
                error!(event_type = %event_type, error = %e, "Failed to emit lifecycle event");
            }
        }
    }
}
