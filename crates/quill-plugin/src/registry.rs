//! Plugin registry: stores loaded plugin instances and their status.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use quill_core::config::PluginManifest;
use quill_core::error::AppError;
use quill_core::result::AppResult;

use crate::api::context::RegistrationGate;
use crate::plugin::Plugin;

/// Lifecycle status of a loaded plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// Instantiated, nothing registered yet.
    Loaded,
    /// Registrations live and `on_activate` succeeded.
    Active,
    /// Deactivated; no registrations.
    Inactive,
    /// A transition failed; needs manual intervention.
    Error,
}

impl PluginStatus {
    /// Whether `activate` may be called from this status.
    pub fn can_activate(self) -> bool {
        matches!(self, Self::Loaded | Self::Inactive | Self::Error)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loaded => "loaded",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A loaded plugin and its bookkeeping.
#[derive(Clone)]
pub struct PluginInstance {
    /// The plugin implementation.
    pub plugin: Arc<dyn Plugin>,
    /// Manifest it was loaded from.
    pub manifest: PluginManifest,
    /// Current status.
    pub status: PluginStatus,
    /// Message of the last failed transition, cleared on success.
    pub error: Option<String>,
    /// When the instance was loaded.
    pub loaded_at: DateTime<Utc>,
    /// When the instance last became active.
    pub activated_at: Option<DateTime<Utc>>,
    /// Open while the plugin may add listeners and hook entries.
    pub(crate) gate: RegistrationGate,
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.plugin.config().id)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl PluginInstance {
    /// The plugin id.
    pub fn id(&self) -> &str {
        &self.plugin.config().id
    }

    /// Status badge for the admin plugin list.
    pub fn summary(&self) -> PluginSummary {
        let config = self.plugin.config();
        PluginSummary {
            id: config.id.clone(),
            name: config.name.clone(),
            version: config.version.clone(),
            description: config.description.clone(),
            status: self.status,
            error: self.error.clone(),
            activated_at: self.activated_at,
        }
    }
}

/// Status badge shown in the admin plugin list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSummary {
    /// Plugin id.
    pub id: String,
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Plugin description.
    pub description: String,
    /// Current status.
    pub status: PluginStatus,
    /// Error message when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the plugin last became active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
}

/// Registry of all loaded plugins, in load order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<PluginInstance>>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a loaded instance. Fails if the id is already present.
    pub async fn insert(&self, instance: PluginInstance) -> AppResult<()> {
        let mut plugins = self.plugins.write().await;
        let id = instance.id().to_string();

        if plugins.iter().any(|p| p.id() == id) {
            return Err(AppError::conflict(format!(
                "Plugin '{id}' is already loaded"
            )));
        }

        info!(
            plugin_id = %id,
            name = %instance.plugin.config().name,
            version = %instance.plugin.config().version,
            "Registering plugin"
        );
        plugins.push(instance);
        Ok(())
    }

    /// Removes and returns an instance.
    pub async fn remove(&self, plugin_id: &str) -> Option<PluginInstance> {
        let mut plugins = self.plugins.write().await;
        let index = plugins.iter().position(|p| p.id() == plugin_id)?;
        Some(plugins.remove(index))
    }

    /// Removes every instance, returning them in load order.
    pub async fn clear(&self) -> Vec<PluginInstance> {
        std::mem::take(&mut *self.plugins.write().await)
    }

    /// Gets a snapshot of an instance.
    pub async fn get(&self, plugin_id: &str) -> Option<PluginInstance> {
        let plugins = self.plugins.read().await;
        plugins.iter().find(|p| p.id() == plugin_id).cloned()
    }

    /// Returns the status of a plugin.
    pub async fn status(&self, plugin_id: &str) -> Option<PluginStatus> {
        let plugins = self.plugins.read().await;
        plugins.iter().find(|p| p.id() == plugin_id).map(|p| p.status)
    }

    /// Updates status and error message of a plugin.
    pub async fn set_status(
        &self,
        plugin_id: &str,
        status: PluginStatus,
        error: Option<String>,
    ) -> AppResult<()> {
        let mut plugins = self.plugins.write().await;
        let instance = plugins
            .iter_mut()
            .find(|p| p.id() == plugin_id)
            .ok_or_else(|| AppError::not_found(format!("Plugin '{plugin_id}' not found")))?;

        instance.status = status;
        instance.error = error;
        if status == PluginStatus::Active {
            instance.activated_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Lists status badges in load order.
    pub async fn list(&self) -> Vec<PluginSummary> {
        let plugins = self.plugins.read().await;
        plugins.iter().map(PluginInstance::summary).collect()
    }

    /// Ids of plugins with the given status, in load order.
    pub async fn ids_with_status(&self, status: PluginStatus) -> Vec<String> {
        let plugins = self.plugins.read().await;
        plugins
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// Checks whether a plugin is loaded.
    pub async fn contains(&self, plugin_id: &str) -> bool {
        let plugins = self.plugins.read().await;
        plugins.iter().any(|p| p.id() == plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::api::registrar::PluginRegistrar;
    use crate::plugin::PluginConfig;

    struct Noop(PluginConfig);

    #[async_trait]
    impl Plugin for Noop {
        fn config(&self) -> &PluginConfig {
            &self.0
        }

        async fn register_hooks(&self, _registrar: &mut PluginRegistrar) -> AppResult<()> {
            Ok(())
        }
    }

    fn instance(id: &str) -> PluginInstance {
        PluginInstance {
            plugin: Arc::new(Noop(PluginConfig::new(id, id.to_uppercase(), "1.0.0"))),
            manifest: PluginManifest::new(id),
            status: PluginStatus::Loaded,
            error: None,
            loaded_at: Utc::now(),
            activated_at: None,
            gate: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let registry = PluginRegistry::new();
        registry.insert(instance("seo")).await.unwrap();
        let err = registry.insert(instance("seo")).await.unwrap_err();
        assert_eq!(err.kind, quill_core::error::ErrorKind::Conflict);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_status_transitions_and_listing_order() {
        let registry = PluginRegistry::new();
        registry.insert(instance("seo")).await.unwrap();
        registry.insert(instance("analytics")).await.unwrap();

        registry
            .set_status("analytics", PluginStatus::Error, Some("boom".into()))
            .await
            .unwrap();
        registry
            .set_status("seo", PluginStatus::Active, None)
            .await
            .unwrap();

        let list = registry.list().await;
        assert_eq!(list[0].id, "seo");
        assert!(list[0].activated_at.is_some());
        assert_eq!(list[1].status, PluginStatus::Error);
        assert_eq!(list[1].error.as_deref(), Some("boom"));
        assert_eq!(
            registry.ids_with_status(PluginStatus::Active).await,
            vec!["seo".to_string()]
        );

        let json = serde_json::to_value(&list[1]).unwrap();
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let registry = PluginRegistry::new();
        registry.insert(instance("a")).await.unwrap();
        registry.insert(instance("b")).await.unwrap();

        assert!(registry.remove("a").await.is_some());
        assert!(registry.remove("a").await.is_none());
        assert_eq!(registry.clear().await.len(), 1);
        assert!(!registry.contains("b").await);
    }
}
