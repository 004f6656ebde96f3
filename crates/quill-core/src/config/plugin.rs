//! Plugin system configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Path prefix under which plugin routes are mounted.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    /// Whether manifests marked `active` are activated on refresh.
    #[serde(default = "default_true")]
    pub auto_activate: bool,
    /// Installed modules, in load order.
    #[serde(default)]
    pub modules: Vec<PluginManifest>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            auto_activate: true,
            modules: Vec::new(),
        }
    }
}

/// Per-module record kept by the host's module/config store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin id; must match a compiled-in factory.
    pub id: String,
    /// Disabled modules are skipped entirely on refresh.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the module should be active after a refresh.
    #[serde(default)]
    pub active: bool,
    /// Initial setting values seeded into the settings store when absent.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl PluginManifest {
    /// Creates an enabled, inactive manifest with no settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            active: false,
            settings: Map::new(),
        }
    }

    /// Marks the manifest as active.
    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    /// Adds an initial setting value.
    pub fn with_setting(mut self, key: &str, value: Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }
}

fn default_route_prefix() -> String {
    "/plugins".to_string()
}

fn default_true() -> bool {
    true
}
