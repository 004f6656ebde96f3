//! # quill-plugin
//!
//! Extensibility kernel for Quill. Provides:
//!
//! - Event manager: priority-ordered pub/sub with per-listener filters,
//!   failure isolation, a bounded history and running metrics
//! - Hook registry: named chain-transform extension points
//! - Plugin contract, registrar and per-plugin context
//! - Plugin lifecycle management (load, activate, deactivate, refresh,
//!   uninstall) with all-or-nothing activation
//! - Route bridge mapping plugin routes and declared settings onto the
//!   host's request/response surface

pub mod api;
pub mod catalog;
pub mod events;
pub mod hooks;
pub mod kernel;
pub mod macros;
pub mod manager;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod routes;
pub mod settings;
pub mod traits;

mod guard;

pub use api::context::PluginContext;
pub use api::registrar::PluginRegistrar;
pub use catalog::PluginCatalog;
pub use events::manager::EventManager;
pub use hooks::definitions::{HookContext, HookPoint, HookResult};
pub use hooks::registry::HookRegistry;
pub use kernel::{Kernel, KernelBuilder};
pub use manager::{PluginManager, RefreshReport};
pub use plugin::{Plugin, PluginConfig};
pub use registry::{PluginRegistry, PluginStatus, PluginSummary};
pub use routes::bridge::RouteBridge;
