//! Collaborator traits defined in `quill-core` and implemented by the host.
//!
//! The kernel never talks to a database or a web server directly; it
//! consumes these capabilities instead.

pub mod plugin_source;
pub mod settings;

pub use plugin_source::PluginSource;
pub use settings::SettingsStore;
