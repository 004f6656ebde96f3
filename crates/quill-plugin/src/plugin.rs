//! The contract every plugin implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quill_core::result::AppResult;

use crate::api::context::PluginContext;
use crate::api::registrar::PluginRegistrar;
use crate::routes::bridge::RouteDefinition;
use crate::settings::SettingDeclaration;

/// Static metadata about a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Unique plugin identifier; also the owner tag of its registrations.
    pub id: String,
    /// Human-readable plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    #[serde(default)]
    pub description: String,
    /// Author or maintainer.
    #[serde(default)]
    pub author: String,
    /// Settings the plugin understands.
    #[serde(default)]
    pub settings: Vec<SettingDeclaration>,
}

impl PluginConfig {
    /// Creates metadata with no description, author or settings.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            settings: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Adds a setting declaration.
    pub fn setting(mut self, declaration: SettingDeclaration) -> Self {
        self.settings.push(declaration);
        self
    }

    /// Finds the declaration for `key`.
    pub fn declaration(&self, key: &str) -> Option<&SettingDeclaration> {
        self.settings.iter().find(|d| d.key == key)
    }
}

/// Trait that all plugins must implement.
///
/// `register_hooks` runs once per activation and is the only place a plugin
/// adds hook entries and event listeners; everything it registers through
/// the registrar is tagged with the plugin id and revoked on deactivation.
/// `on_activate` and `on_deactivate` must tolerate repeated
/// activate/deactivate cycles.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns plugin metadata.
    fn config(&self) -> &PluginConfig;

    /// Registers hook entries and event listeners.
    async fn register_hooks(&self, registrar: &mut PluginRegistrar) -> AppResult<()>;

    /// Called after registration when the plugin becomes active.
    async fn on_activate(&self, _ctx: &PluginContext) -> AppResult<()> {
        Ok(())
    }

    /// Called after the plugin's registrations have been revoked.
    async fn on_deactivate(&self, _ctx: &PluginContext) -> AppResult<()> {
        Ok(())
    }

    /// HTTP-like routes mounted under the plugin's prefix while active.
    fn routes(&self) -> Vec<RouteDefinition> {
        Vec::new()
    }
}
