//! Hook registry: plugins register chain entries by hook name with priority ordering.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use quill_core::events::validate_event_name;
use quill_core::result::AppResult;
use quill_core::types::HookEntryId;

use super::definitions::{HookContext, HookResult};

/// Priority given to hook entries registered without an explicit one.
pub const DEFAULT_HOOK_PRIORITY: i32 = 50;

/// Trait for hook handler implementations.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles one step of a chain. `value` is the current threaded value.
    async fn handle(&self, value: Value, ctx: &HookContext) -> AppResult<HookResult>;
}

/// Entry in the hook registry.
pub(crate) struct HookEntry {
    pub(crate) id: HookEntryId,
    /// Plugin that registered this handler.
    pub(crate) plugin_id: String,
    /// Priority (lower = earlier execution).
    pub(crate) priority: i32,
    pub(crate) handler: Arc<dyn HookHandler>,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("id", &self.id)
            .field("plugin_id", &self.plugin_id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Registry of hook chain entries organized by hook name.
#[derive(Debug)]
pub struct HookRegistry {
    /// Hook name → entries sorted by ascending priority, ties in
    /// registration order.
    entries: RwLock<HashMap<String, Vec<Arc<HookEntry>>>>,
    /// Optional per-entry time budget.
    pub(crate) handler_timeout: Option<Duration>,
}

impl HookRegistry {
    /// Creates a new empty hook registry without a handler timeout.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// Creates a registry whose entries are abandoned after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            handler_timeout: timeout,
        }
    }

    /// Registers a handler under `hook` for `plugin_id`.
    pub async fn register(
        &self,
        hook: impl AsRef<str>,
        plugin_id: &str,
        priority: i32,
        handler: Arc<dyn HookHandler>,
    ) -> AppResult<HookEntryId> {
        let hook = hook.as_ref();
        validate_event_name(hook, false)?;

        let id = HookEntryId::new();
        let mut entries = self.entries.write().await;
        let chain = entries.entry(hook.to_string()).or_default();

        chain.push(Arc::new(HookEntry {
            id,
            plugin_id: plugin_id.to_string(),
            priority,
            handler,
        }));

        // Stable: equal priorities keep registration order
        chain.sort_by_key(|e| e.priority);

        info!(
            hook = %hook,
            plugin_id = %plugin_id,
            priority = priority,
            entry_id = %id,
            "Hook handler registered"
        );

        Ok(id)
    }

    /// Removes a single entry. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: HookEntryId) -> bool {
        let removed = self.remove_where(|e| e.id == id).await > 0;
        if removed {
            debug!(entry_id = %id, "Hook handler unregistered");
        }
        removed
    }

    /// Removes a single entry if `plugin_id` registered it.
    pub(crate) async fn unregister_owned(&self, id: HookEntryId, plugin_id: &str) -> bool {
        let removed = self
            .remove_where(|e| e.id == id && e.plugin_id == plugin_id)
            .await
            > 0;
        if removed {
            debug!(entry_id = %id, plugin_id = %plugin_id, "Hook handler unregistered");
        }
        removed
    }

    /// Unregisters all handlers for a specific plugin. Returns how many
    /// entries were removed.
    pub async fn unregister_plugin(&self, plugin_id: &str) -> usize {
        let removed = self.remove_where(|e| e.plugin_id == plugin_id).await;
        info!(plugin_id = %plugin_id, removed, "All hooks unregistered for plugin");
        removed
    }

    async fn remove_where(&self, matches: impl Fn(&HookEntry) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let mut removed = 0;

        for chain in entries.values_mut() {
            let before = chain.len();
            chain.retain(|e| !matches(e));
            removed += before - chain.len();
        }

        // Remove empty hook entries
        entries.retain(|_, chain| !chain.is_empty());
        removed
    }

    /// Snapshot of the entries for `hook`, in execution order.
    pub(crate) async fn chain(&self, hook: &str) -> Vec<Arc<HookEntry>> {
        self.entries
            .read()
            .await
            .get(hook)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns whether any handlers are registered for a hook.
    pub async fn has_handlers(&self, hook: impl AsRef<str>) -> bool {
        self.handler_count(hook).await > 0
    }

    /// Returns the number of handlers registered for a hook.
    pub async fn handler_count(&self, hook: impl AsRef<str>) -> usize {
        let entries = self.entries.read().await;
        entries.get(hook.as_ref()).map(Vec::len).unwrap_or(0)
    }

    /// Returns the number of entries owned by a plugin across all hooks.
    pub async fn plugin_entry_count(&self, plugin_id: &str) -> usize {
        self.entries
            .read()
            .await
            .values()
            .flat_map(|chain| chain.iter())
            .filter(|e| e.plugin_id == plugin_id)
            .count()
    }

    /// Returns all hook names with at least one entry, sorted.
    pub async fn registered_hooks(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut hooks: Vec<String> = entries.keys().cloned().collect();
        hooks.sort();
        hooks
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
