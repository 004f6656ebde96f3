//! Plugin lifecycle event names. All are emitted with source `"system"`
//! and carry `{"plugin_id": ...}` plus transition specific fields.

/// A plugin instance was loaded from its manifest.
pub const LOADED: &str = "plugin:loaded";
/// A plugin finished activating.
pub const ACTIVATED: &str = "plugin:activated";
/// A plugin finished deactivating.
pub const DEACTIVATED: &str = "plugin:deactivated";
/// A plugin transition failed; the plugin is now in `error` state.
pub const ERROR: &str = "plugin:error";
/// A plugin instance was discarded.
pub const UNINSTALLED: &str = "plugin:uninstalled";
/// A plugin's persisted settings were updated through the admin surface.
pub const SETTINGS_UPDATED: &str = "plugin:settings-updated";
