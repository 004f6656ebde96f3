//! # quill-plugin-sdk
//!
//! SDK for developing Quill plugins.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quill_plugin_sdk::prelude::*;
//!
//! struct Seo {
//!     config: PluginConfig,
//! }
//!
//! impl Seo {
//!     fn new() -> Self {
//!         Self {
//!             config: plugin_config!(
//!                 id: "seo",
//!                 name: "SEO Tools",
//!                 version: "1.0.0",
//!                 settings: [
//!                     SettingDeclaration::new("title_suffix", SettingKind::String)
//!                         .default_value(json!(" | Quill")),
//!                 ]
//!             ),
//!         }
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Seo {
//!     fn config(&self) -> &PluginConfig {
//!         &self.config
//!     }
//!
//!     async fn register_hooks(&self, registrar: &mut PluginRegistrar) -> AppResult<()> {
//!         registrar
//!             .register_hook_fn(HookPoint::ContentBeforeRender, 10, |value: Value, _ctx: &HookContext| async move {
//!                 Ok(HookResult::continue_with(value))
//!             })
//!             .await?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Plugins are exercised in tests through [`testing::PluginHarness`].

pub mod testing;

/// Prelude for convenient imports.
pub mod prelude {
    pub use quill_plugin::prelude::*;

    pub use crate::testing::{PluginHarness, PluginHarnessBuilder};
}
