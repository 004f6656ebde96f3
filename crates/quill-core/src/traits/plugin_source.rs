//! Module/config store trait supplying plugin manifests.

use async_trait::async_trait;

use crate::config::PluginManifest;
use crate::result::AppResult;

/// Source of installed-module records (the host's module/config store).
#[async_trait]
pub trait PluginSource: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch the manifest for one plugin id.
    ///
    /// Returns a `NotFound` error when the module is not installed.
    async fn manifest(&self, plugin_id: &str) -> AppResult<PluginManifest>;

    /// List every installed manifest in load order.
    async fn manifests(&self) -> AppResult<Vec<PluginManifest>>;
}
