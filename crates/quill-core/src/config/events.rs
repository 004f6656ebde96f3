//! Event manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event manager and hook registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Maximum number of events kept in the history ring buffer.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Number of completed emissions averaged for `average_processing_time`.
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,
    /// Optional per-callback time budget in milliseconds for listeners and
    /// hook entries. Unset means callbacks may run indefinitely.
    #[serde(default)]
    pub handler_timeout_ms: Option<u64>,
}

impl EventsConfig {
    /// Returns the handler timeout as a `Duration`, if configured.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            metrics_window: default_metrics_window(),
            handler_timeout_ms: None,
        }
    }
}

fn default_history_capacity() -> usize {
    1000
}

fn default_metrics_window() -> usize {
    100
}
