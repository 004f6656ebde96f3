//! Plugin source backed by the `[[plugins.modules]]` configuration list.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::PluginManifest;
use crate::error::AppError;
use crate::result::AppResult;
use crate::traits::plugin_source::PluginSource;

/// Manifest source holding an in-memory list, seeded from configuration.
///
/// Admin tooling can replace or update entries and then ask the lifecycle
/// manager to refresh.
#[derive(Debug, Default)]
pub struct StaticPluginSource {
    /// Manifests in load order.
    manifests: RwLock<Vec<PluginManifest>>,
}

impl StaticPluginSource {
    /// Create a source from a list of manifests.
    pub fn new(manifests: Vec<PluginManifest>) -> Self {
        Self {
            manifests: RwLock::new(manifests),
        }
    }

    /// Insert a manifest or replace the one with the same id.
    pub async fn upsert(&self, manifest: PluginManifest) {
        let mut manifests = self.manifests.write().await;
        match manifests.iter_mut().find(|m| m.id == manifest.id) {
            Some(existing) => *existing = manifest,
            None => manifests.push(manifest),
        }
    }

    /// Remove a manifest. Returns `true` when it existed.
    pub async fn remove(&self, plugin_id: &str) -> bool {
        let mut manifests = self.manifests.write().await;
        let before = manifests.len();
        manifests.retain(|m| m.id != plugin_id);
        manifests.len() < before
    }

    /// Replace every manifest.
    pub async fn replace_all(&self, manifests: Vec<PluginManifest>) {
        *self.manifests.write().await = manifests;
    }
}

#[async_trait]
impl PluginSource for StaticPluginSource {
    async fn manifest(&self, plugin_id: &str) -> AppResult<PluginManifest> {
        self.manifests
            .read()
            .await
            .iter()
            .find(|m| m.id == plugin_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Module '{plugin_id}' is not installed")))
    }

    async fn manifests(&self) -> AppResult<Vec<PluginManifest>> {
        Ok(self.manifests.read().await.clone())
    }
}
