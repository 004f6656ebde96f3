//! In-memory settings store backed by `dashmap`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::result::AppResult;
use crate::traits::settings::SettingsStore;

/// Settings store keeping values in memory, keyed by `(plugin_id, key)`.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    /// Plugin id → key → value.
    values: Arc<DashMap<String, Map<String, Value>>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, plugin_id: &str, key: &str) -> AppResult<Option<Value>> {
        Ok(self
            .values
            .get(plugin_id)
            .and_then(|settings| settings.get(key).cloned()))
    }

    async fn set(&self, plugin_id: &str, key: &str, value: Value) -> AppResult<()> {
        debug!(plugin_id, key, "Setting stored");
        self.values
            .entry(plugin_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, plugin_id: &str, key: &str) -> AppResult<bool> {
        Ok(self
            .values
            .get_mut(plugin_id)
            .map(|mut settings| settings.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn all(&self, plugin_id: &str) -> AppResult<Map<String, Value>> {
        Ok(self
            .values
            .get(plugin_id)
            .map(|settings| settings.value().clone())
            .unwrap_or_default())
    }
}
