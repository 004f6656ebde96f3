//! Settings store trait for per-plugin persisted configuration.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::result::AppResult;

/// Key/value settings store scoped per plugin id.
///
/// No schema is imposed beyond JSON values; the kernel validates values
/// against a plugin's declared settings before writing them.
#[async_trait]
pub trait SettingsStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value. Returns `None` when the key was never set.
    async fn get(&self, plugin_id: &str, key: &str) -> AppResult<Option<Value>>;

    /// Set a value, replacing any previous one.
    async fn set(&self, plugin_id: &str, key: &str, value: Value) -> AppResult<()>;

    /// Delete a value. Returns `true` when a value existed.
    async fn delete(&self, plugin_id: &str, key: &str) -> AppResult<bool>;

    /// Return every stored value for a plugin.
    async fn all(&self, plugin_id: &str) -> AppResult<Map<String, Value>>;
}
