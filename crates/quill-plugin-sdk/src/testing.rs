//! In-process harness for exercising plugins against a real kernel.
//!
//! The harness wires a [`Kernel`] with an in-memory settings store and a
//! manifest list built from the plugins handed to the builder, so a plugin
//! can be activated, driven through hooks, events and routes, and torn down
//! again in a test.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use quill_core::config::{AppConfig, EventsConfig, PluginManifest};
use quill_core::events::Event;
use quill_core::result::AppResult;
use quill_core::stores::{MemorySettingsStore, StaticPluginSource};
use quill_core::traits::SettingsStore;
use quill_plugin::events::HistoryFilter;
use quill_plugin::hooks::HookContext;
use quill_plugin::routes::{BufferedResponse, Method, PluginRequest};
use quill_plugin::{
    EventManager, HookRegistry, Kernel, Plugin, PluginCatalog, PluginContext, PluginManager,
    PluginStatus,
};

/// A kernel plus the handles tests usually need.
#[derive(Debug, Clone)]
pub struct PluginHarness {
    kernel: Kernel,
    source: Arc<StaticPluginSource>,
    settings: Arc<MemorySettingsStore>,
}

impl PluginHarness {
    /// Starts building a harness.
    pub fn builder() -> PluginHarnessBuilder {
        PluginHarnessBuilder::default()
    }

    /// The assembled kernel.
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Shared event manager.
    pub fn events(&self) -> &Arc<EventManager> {
        &self.kernel.events
    }

    /// Shared hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.kernel.hooks
    }

    /// Lifecycle manager.
    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.kernel.manager
    }

    /// Manifest list backing the lifecycle manager.
    pub fn source(&self) -> &Arc<StaticPluginSource> {
        &self.source
    }

    /// Settings store shared by every plugin context.
    pub fn settings(&self) -> &Arc<MemorySettingsStore> {
        &self.settings
    }

    /// Loads the plugin if needed, then activates it.
    pub async fn activate(&self, plugin_id: &str) -> AppResult<()> {
        if self.manager().status(plugin_id).await.is_none() {
            self.manager().load_plugin(plugin_id).await?;
        }
        self.manager().activate(plugin_id).await
    }

    /// Deactivates an active plugin.
    pub async fn deactivate(&self, plugin_id: &str) -> AppResult<()> {
        self.manager().deactivate(plugin_id).await
    }

    /// Current lifecycle status of a plugin.
    pub async fn status(&self, plugin_id: &str) -> Option<PluginStatus> {
        self.manager().status(plugin_id).await
    }

    /// Context a loaded plugin receives.
    pub async fn context(&self, plugin_id: &str) -> AppResult<PluginContext> {
        self.manager().plugin_context(plugin_id).await
    }

    /// Sends a request through the route bridge.
    ///
    /// Returns `None` when no plugin route matches.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Value,
    ) -> AppResult<Option<BufferedResponse>> {
        let mut req = PluginRequest::new(method, url).with_body(body);
        let mut res = BufferedResponse::new();
        let matched = self.kernel.routes.dispatch(&mut req, &mut res).await?;
        debug!(method = %method, url = %url, matched, "Harness request dispatched");
        Ok(matched.then_some(res))
    }

    /// Emits an event with the given source.
    pub async fn emit(&self, event_type: &str, data: Value, source: &str) -> AppResult<()> {
        self.events()
            .emit_event(event_type, data, source, None)
            .await
    }

    /// Runs a hook chain with an empty context.
    pub async fn run_hook(&self, hook: impl AsRef<str>, value: Value) -> Value {
        self.hooks()
            .run_hook_chain(hook, value, &HookContext::new())
            .await
    }

    /// Recorded events of one type, most recent first.
    pub fn events_of(&self, event_type: &str) -> Vec<Event> {
        self.events()
            .get_event_history(&HistoryFilter::new().event_type(event_type))
    }

    /// Listeners, hook entries and routes currently owned by a plugin.
    ///
    /// The built-in settings routes count as routes.
    pub async fn registration_count(&self, plugin_id: &str) -> usize {
        self.events().plugin_listener_count(plugin_id).await
            + self.hooks().plugin_entry_count(plugin_id).await
            + self.kernel.routes.plugin_route_count(plugin_id).await
    }
}

/// Builder for [`PluginHarness`].
#[derive(Debug, Default)]
pub struct PluginHarnessBuilder {
    config: AppConfig,
    catalog: PluginCatalog,
    manifests: Vec<PluginManifest>,
}

impl PluginHarnessBuilder {
    /// Adds a plugin factory and, unless one was already given, an enabled
    /// inactive manifest for it.
    pub fn plugin<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        let id = factory().config().id.clone();
        if !self.manifests.iter().any(|m| m.id == id) {
            self.manifests.push(PluginManifest::new(id.clone()));
        }
        self.catalog.insert(id, factory);
        self
    }

    /// Sets the manifest for a plugin, replacing any earlier one.
    pub fn manifest(mut self, manifest: PluginManifest) -> Self {
        match self.manifests.iter_mut().find(|m| m.id == manifest.id) {
            Some(existing) => *existing = manifest,
            None => self.manifests.push(manifest),
        }
        self
    }

    /// Overrides the event manager settings.
    pub fn events_config(mut self, events: EventsConfig) -> Self {
        self.config.events = events;
        self
    }

    /// Overrides the plugin route prefix.
    pub fn route_prefix(mut self, prefix: &str) -> Self {
        self.config.plugins.route_prefix = prefix.to_string();
        self
    }

    /// Builds the kernel.
    pub fn build(self) -> PluginHarness {
        let source = Arc::new(StaticPluginSource::new(self.manifests));
        let settings = Arc::new(MemorySettingsStore::new());

        let kernel = Kernel::builder(&self.config)
            .catalog(self.catalog)
            .plugin_source(source.clone())
            .settings_store(settings.clone() as Arc<dyn SettingsStore>)
            .build();

        PluginHarness {
            kernel,
            source,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    use quill_core::events::{content, plugin};

    struct Excerpt {
        config: PluginConfig,
    }

    impl Excerpt {
        fn create() -> Arc<dyn Plugin> {
            Arc::new(Self {
                config: plugin_config!(
                    id: "excerpt",
                    name: "Excerpt",
                    version: "0.1.0",
                    settings: [
                        SettingDeclaration::new("length", SettingKind::Integer)
                            .default_value(json!(5)),
                    ]
                ),
            })
        }
    }

    struct Ping;

    #[async_trait]
    impl RouteHandler for Ping {
        async fn handle(
            &self,
            req: &PluginRequest,
            res: &mut dyn PluginResponse,
            _ctx: &PluginContext,
        ) -> AppResult<()> {
            res.json(json!({ "pong": req.query_param("n") }));
            Ok(())
        }
    }

    #[async_trait]
    impl Plugin for Excerpt {
        fn config(&self) -> &PluginConfig {
            &self.config
        }

        async fn register_hooks(&self, registrar: &mut PluginRegistrar) -> AppResult<()> {
            registrar
                .register_hook_fn(
                    HookPoint::ContentAfterLoad,
                    DEFAULT_HOOK_PRIORITY,
                    |value: Value, _ctx: &HookContext| async move {
                        let text = value.as_str().unwrap_or_default();
                        Ok(HookResult::continue_with(json!(
                            text.chars().take(5).collect::<String>()
                        )))
                    },
                )
                .await?;
            registrar
                .on_event(content::PUBLISHED, |_event: Arc<Event>| async move { Ok(()) })
                .await?;
            Ok(())
        }

        fn routes(&self) -> Vec<RouteDefinition> {
            vec![RouteDefinition::get("/ping", Arc::new(Ping))]
        }
    }

    #[tokio::test]
    async fn test_harness_drives_plugin() {
        let harness = PluginHarness::builder().plugin(Excerpt::create).build();
        harness.activate("excerpt").await.unwrap();
        assert_eq!(harness.status("excerpt").await, Some(PluginStatus::Active));

        let out = harness
            .run_hook(HookPoint::ContentAfterLoad, json!("Hello, world"))
            .await;
        assert_eq!(out, json!("Hello"));

        let res = harness
            .request(Method::Get, "/plugins/excerpt/ping?n=3", Value::Null)
            .await
            .unwrap()
            .expect("route matched");
        assert_eq!(res.json_body(), Some(&json!({ "pong": "3" })));

        let ctx = harness.context("excerpt").await.unwrap();
        assert_eq!(ctx.get_setting_as::<i64>("length").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_deactivate_clears_registrations() {
        let harness = PluginHarness::builder().plugin(Excerpt::create).build();
        harness.activate("excerpt").await.unwrap();
        // hook + listener + ping + settings GET/PUT
        assert_eq!(harness.registration_count("excerpt").await, 5);

        harness.deactivate("excerpt").await.unwrap();
        assert_eq!(harness.registration_count("excerpt").await, 0);
        assert!(
            harness
                .request(Method::Get, "/plugins/excerpt/ping", Value::Null)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_manifest_override_drives_refresh() {
        let harness = PluginHarness::builder()
            .plugin(Excerpt::create)
            .manifest(PluginManifest::new("excerpt").activated())
            .build();

        let report = harness.manager().refresh_plugins().await.unwrap();
        assert_eq!(report.activated, vec!["excerpt".to_string()]);
        assert_eq!(harness.events_of(plugin::ACTIVATED).len(), 1);
    }
}
