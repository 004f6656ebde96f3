//! Plugin context: kernel services available to one plugin.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use quill_core::error::AppError;
use quill_core::events::Event;
use quill_core::result::AppResult;
use quill_core::traits::SettingsStore;
use quill_core::types::{HookEntryId, ListenerId};

use crate::events::listener::{EventListener, ListenerOptions, Subscription};
use crate::events::manager::EventManager;
use crate::hooks::definitions::{HookContext, HookResult};
use crate::hooks::registry::{HookHandler, HookRegistry};
use crate::settings::{SettingDeclaration, effective_settings};
use crate::traits::{hook_fn, listener_fn};

/// Shared switch deciding whether a plugin may add registrations.
///
/// Opened by the lifecycle manager right before `register_hooks` and closed
/// before the plugin's registrations are revoked, so a context kept past
/// deactivation cannot register anything new.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegistrationGate(Arc<AtomicBool>);

impl RegistrationGate {
    pub(crate) fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context handed to a plugin's lifecycle callbacks and route handlers.
///
/// Scoped to one plugin id: settings are read from and written to that
/// plugin's namespace, events are emitted with it as the source, and every
/// listener or hook entry added through it is owned by it.
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,
    events: Arc<EventManager>,
    hooks: Arc<HookRegistry>,
    settings: Arc<dyn SettingsStore>,
    declarations: Arc<Vec<SettingDeclaration>>,
    gate: RegistrationGate,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("registrations_open", &self.gate.is_open())
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Creates a context for `plugin_id` that accepts registrations.
    pub(crate) fn new(
        plugin_id: impl Into<String>,
        events: Arc<EventManager>,
        hooks: Arc<HookRegistry>,
        settings: Arc<dyn SettingsStore>,
        declarations: Vec<SettingDeclaration>,
    ) -> Self {
        let gate = RegistrationGate::default();
        gate.open();
        Self {
            plugin_id: plugin_id.into(),
            events,
            hooks,
            settings,
            declarations: Arc::new(declarations),
            gate,
        }
    }

    /// Ties registrations to a lifecycle-managed gate.
    pub(crate) fn with_gate(mut self, gate: RegistrationGate) -> Self {
        self.gate = gate;
        self
    }

    /// The plugin this context belongs to.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub(crate) fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub(crate) fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Subscribes a listener owned by this plugin to `event` (or `"*"`).
    ///
    /// Fails with a conflict once the plugin has been deactivated.
    pub async fn add_event_listener(
        &self,
        event: &str,
        listener: Arc<dyn EventListener>,
        options: ListenerOptions,
    ) -> AppResult<Subscription> {
        self.ensure_open()?;
        let subscription = self
            .events
            .add_event_listener(event, listener, &self.plugin_id, options)
            .await?;

        // Lost a race with revocation
        if !self.gate.is_open() {
            self.events
                .remove_owned_listener(subscription.id(), &self.plugin_id)
                .await;
            return Err(self.closed_error());
        }
        Ok(subscription)
    }

    /// Subscribes a closure with default options.
    pub async fn on_event<F, Fut>(&self, event: &str, callback: F) -> AppResult<Subscription>
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.add_event_listener(event, listener_fn(callback), ListenerOptions::new())
            .await
    }

    /// Removes one of this plugin's listeners. Listeners owned by other
    /// plugins are left alone and report `false`.
    pub async fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.remove_owned_listener(id, &self.plugin_id).await
    }

    /// Adds a chain entry owned by this plugin. Lower priorities run first.
    pub async fn register_hook(
        &self,
        hook: impl AsRef<str>,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) -> AppResult<HookEntryId> {
        self.ensure_open()?;
        let id = self
            .hooks
            .register(hook, &self.plugin_id, priority, handler)
            .await?;

        if !self.gate.is_open() {
            self.hooks.unregister_owned(id, &self.plugin_id).await;
            return Err(self.closed_error());
        }
        Ok(id)
    }

    /// Adds a closure chain entry owned by this plugin.
    pub async fn register_hook_fn<F, Fut>(
        &self,
        hook: impl AsRef<str>,
        priority: i32,
        handler: F,
    ) -> AppResult<HookEntryId>
    where
        F: Fn(Value, &HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookResult>> + Send + 'static,
    {
        self.register_hook(hook, hook_fn(handler), priority).await
    }

    /// Removes one of this plugin's hook entries. Entries owned by other
    /// plugins are left alone and report `false`.
    pub async fn unregister_hook(&self, id: HookEntryId) -> bool {
        self.hooks.unregister_owned(id, &self.plugin_id).await
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.gate.is_open() {
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }

    fn closed_error(&self) -> AppError {
        warn!(plugin_id = %self.plugin_id, "Registration attempted while plugin is not active");
        AppError::conflict(format!(
            "Plugin '{}' cannot register while it is not active",
            self.plugin_id
        ))
    }

    /// The plugin's declared settings.
    pub fn declarations(&self) -> &[SettingDeclaration] {
        &self.declarations
    }

    /// Reads a setting from the store, falling back to `default` when
    /// nothing (or `null`) is stored.
    pub async fn get_setting(&self, key: &str, default: Value) -> AppResult<Value> {
        let stored = self.settings.get(&self.plugin_id, key).await?;
        Ok(stored.filter(|v| !v.is_null()).unwrap_or(default))
    }

    /// Reads a setting as `T`, falling back to the declared default.
    ///
    /// Returns `Ok(None)` when neither a stored value nor a default exists.
    pub async fn get_setting_as<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let declared = self
            .declarations
            .iter()
            .find(|d| d.key == key)
            .and_then(|d| d.default.clone())
            .unwrap_or(Value::Null);

        match self.get_setting(key, declared).await? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value).map(Some).map_err(|e| {
                AppError::validation(format!(
                    "Setting '{key}' of plugin '{}' has an unexpected shape: {e}",
                    self.plugin_id
                ))
            }),
        }
    }

    /// Declared defaults overlaid with every stored value.
    pub async fn settings(&self) -> AppResult<Map<String, Value>> {
        let stored = self.settings.all(&self.plugin_id).await?;
        Ok(effective_settings(&self.declarations, &stored))
    }

    /// Writes a setting. Declared keys are validated against their
    /// declaration; undeclared keys are stored as plugin-private state.
    pub async fn set_setting(&self, key: &str, value: Value) -> AppResult<()> {
        if let Some(declaration) = self.declarations.iter().find(|d| d.key == key) {
            declaration
                .check(&value)
                .map_err(|message| AppError::validation(format!("{key}: {message}")))?;
        }
        self.settings.set(&self.plugin_id, key, value).await
    }

    /// Emits an event with this plugin as the source.
    pub async fn emit(&self, event_type: &str, data: Value) -> AppResult<()> {
        self.events
            .emit_event(event_type, data, &self.plugin_id, None)
            .await
    }

    /// Emits an event with this plugin as the source and side-channel metadata.
    pub async fn emit_with_metadata(
        &self,
        event_type: &str,
        data: Value,
        metadata: Value,
    ) -> AppResult<()> {
        self.events
            .emit_event(event_type, data, &self.plugin_id, Some(metadata))
            .await
    }

    /// Runs a hook chain on the shared registry.
    pub async fn run_hook_chain(
        &self,
        hook: impl AsRef<str>,
        initial: Value,
        ctx: &HookContext,
    ) -> Value {
        self.hooks.run_hook_chain(hook, initial, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::stores::MemorySettingsStore;
    use serde_json::json;

    use crate::events::HistoryFilter;
    use crate::settings::{SettingKind, SettingValidation};

    fn context() -> PluginContext {
        PluginContext::new(
            "s3-storage",
            Arc::new(EventManager::default()),
            Arc::new(HookRegistry::new()),
            Arc::new(MemorySettingsStore::new()),
            vec![
                SettingDeclaration::new("url_expiry", SettingKind::Integer)
                    .default_value(json!(3600))
                    .validation(SettingValidation {
                        min: Some(60.0),
                        ..Default::default()
                    }),
                SettingDeclaration::new("bucket", SettingKind::String),
            ],
        )
    }

    #[tokio::test]
    async fn test_get_setting_falls_back_to_caller_default() {
        let ctx = context();
        assert_eq!(ctx.get_setting("bucket", json!("fallback")).await.unwrap(), "fallback");

        ctx.set_setting("bucket", json!("media")).await.unwrap();
        assert_eq!(ctx.get_setting("bucket", json!("fallback")).await.unwrap(), "media");
    }

    #[tokio::test]
    async fn test_typed_setting_uses_declared_default() {
        let ctx = context();
        assert_eq!(ctx.get_setting_as::<u64>("url_expiry").await.unwrap(), Some(3600));
        assert_eq!(ctx.get_setting_as::<String>("bucket").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_setting_validates_declared_keys() {
        let ctx = context();
        assert!(ctx.set_setting("url_expiry", json!(10)).await.is_err());
        assert!(ctx.set_setting("url_expiry", json!("soon")).await.is_err());
        ctx.set_setting("last_sync", json!("2026-01-01")).await.unwrap();

        let settings = ctx.settings().await.unwrap();
        assert_eq!(settings["url_expiry"], 3600);
        assert_eq!(settings["last_sync"], "2026-01-01");
    }

    #[tokio::test]
    async fn test_emit_uses_plugin_as_source() {
        let ctx = context();
        ctx.emit("media:uploaded", json!({ "key": "a.png" })).await.unwrap();

        let history = ctx
            .events()
            .get_event_history(&HistoryFilter::new().source("s3-storage"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, "media:uploaded");
    }

    fn passthrough() -> Arc<dyn HookHandler> {
        hook_fn(|value: Value, _ctx: &HookContext| async move {
            Ok(HookResult::continue_with(value))
        })
    }

    #[tokio::test]
    async fn test_removal_is_scoped_to_owner() {
        let ctx = context();
        let cdn = PluginContext::new(
            "cdn",
            ctx.events().clone(),
            ctx.hooks().clone(),
            Arc::new(MemorySettingsStore::new()),
            Vec::new(),
        );

        let theirs = cdn
            .on_event("media:uploaded", |_event: Arc<Event>| async { Ok(()) })
            .await
            .unwrap();
        let entry = cdn.register_hook("media:url", passthrough(), 10).await.unwrap();

        assert!(!ctx.remove_event_listener(theirs.id()).await);
        assert!(!ctx.unregister_hook(entry).await);
        assert_eq!(ctx.events().plugin_listener_count("cdn").await, 1);
        assert_eq!(ctx.hooks().handler_count("media:url").await, 1);

        assert!(cdn.remove_event_listener(theirs.id()).await);
        assert!(cdn.unregister_hook(entry).await);
        assert_eq!(ctx.hooks().handler_count("media:url").await, 0);
    }

    #[tokio::test]
    async fn test_closed_gate_rejects_registration() {
        let gate = RegistrationGate::default();
        let ctx = context().with_gate(gate.clone());

        let err = ctx
            .on_event("media:uploaded", |_event: Arc<Event>| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind, quill_core::error::ErrorKind::Conflict);

        gate.open();
        let subscription = ctx
            .on_event("media:uploaded", |_event: Arc<Event>| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(ctx.events().plugin_listener_count("s3-storage").await, 1);

        gate.close();
        assert!(ctx.register_hook("media:url", passthrough(), 10).await.is_err());
        assert!(ctx.remove_event_listener(subscription.id()).await);
        assert_eq!(ctx.hooks().plugin_entry_count("s3-storage").await, 0);
    }
}
