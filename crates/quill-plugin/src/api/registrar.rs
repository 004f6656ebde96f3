//! Registration surface handed to `Plugin::register_hooks`.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use quill_core::events::Event;
use quill_core::result::AppResult;
use quill_core::types::HookEntryId;

use super::context::PluginContext;
use crate::events::listener::{EventListener, ListenerOptions, Subscription};
use crate::hooks::definitions::{HookContext, HookResult};
use crate::hooks::registry::HookHandler;
use crate::traits::{hook_fn, listener_fn};

/// Records a plugin's hook entries and event listeners during activation.
///
/// Every registration is tagged with the plugin id so the lifecycle manager
/// can revoke them in bulk.
#[derive(Debug)]
pub struct PluginRegistrar {
    context: PluginContext,
    subscriptions: Vec<Subscription>,
    hook_entries: Vec<HookEntryId>,
}

impl PluginRegistrar {
    pub(crate) fn new(context: PluginContext) -> Self {
        Self {
            context,
            subscriptions: Vec::new(),
            hook_entries: Vec::new(),
        }
    }

    /// The owning plugin's context.
    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// The owning plugin's id.
    pub fn plugin_id(&self) -> &str {
        self.context.plugin_id()
    }

    /// Adds a chain entry under `hook`. Lower priorities run first.
    pub async fn register_hook(
        &mut self,
        hook: impl AsRef<str>,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) -> AppResult<HookEntryId> {
        let id = self.context.register_hook(hook, handler, priority).await?;
        self.hook_entries.push(id);
        Ok(id)
    }

    /// Adds a closure chain entry under `hook`.
    pub async fn register_hook_fn<F, Fut>(
        &mut self,
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

    /// Subscribes a listener to `event` (or `"*"`).
    pub async fn add_event_listener(
        &mut self,
        event: &str,
        listener: Arc<dyn EventListener>,
        options: ListenerOptions,
    ) -> AppResult<Subscription> {
        let subscription = self
            .context
            .add_event_listener(event, listener, options)
            .await?;
        self.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    /// Subscribes a closure to `event` with default options.
    pub async fn on_event<F, Fut>(&mut self, event: &str, callback: F) -> AppResult<Subscription>
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.add_event_listener(event, listener_fn(callback), ListenerOptions::new())
            .await
    }

    /// Number of listeners registered through this registrar.
    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of hook entries registered through this registrar.
    pub fn hook_count(&self) -> usize {
        self.hook_entries.len()
    }
}
