//! In-memory collaborator implementations.
//!
//! Used by the host binary when no external store is configured, and by
//! tests.

pub mod memory_settings;
pub mod static_source;

pub use memory_settings::MemorySettingsStore;
pub use static_source::StaticPluginSource;
