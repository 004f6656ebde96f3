//! Plugin API: the per-plugin context and the registration surface.

pub mod context;
pub mod registrar;

pub use context::PluginContext;
pub use registrar::PluginRegistrar;
