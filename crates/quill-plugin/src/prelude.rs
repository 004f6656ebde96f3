//! Prelude for convenient imports.

pub use async_trait::async_trait;
pub use serde_json::{Value, json};

pub use quill_core::error::AppError;
pub use quill_core::events::{Event, EventPriority};
pub use quill_core::result::AppResult;

pub use crate::api::context::PluginContext;
pub use crate::api::registrar::PluginRegistrar;
pub use crate::events::listener::{EventListener, ListenerOptions, Subscription};
pub use crate::hooks::definitions::{HookContext, HookPoint, HookResult};
pub use crate::hooks::registry::{DEFAULT_HOOK_PRIORITY, HookHandler};
pub use crate::plugin::{Plugin, PluginConfig};
pub use crate::routes::bridge::{RouteDefinition, RouteHandler};
pub use crate::routes::request::{Method, PluginRequest, PluginResponse};
pub use crate::settings::{SettingDeclaration, SettingKind, SettingValidation};
pub use crate::traits::{hook_fn, listener_fn};

pub use crate::plugin_config;
