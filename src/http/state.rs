//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use quill_core::config::AppConfig;
use quill_plugin::Kernel;

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The plugin kernel.
    pub kernel: Kernel,
}

impl AppState {
    /// Creates the state from a built kernel.
    pub fn new(config: AppConfig, kernel: Kernel) -> Self {
        Self {
            config: Arc::new(config),
            kernel,
        }
    }
}
