//! System-level event names and payloads.

use serde::{Deserialize, Serialize};

use crate::types::{EventId, ListenerId};

/// The host finished booting.
pub const STARTUP: &str = "system:startup";
/// The host is shutting down.
pub const SHUTDOWN: &str = "system:shutdown";
/// An event listener failed; carries a [`ListenerErrorPayload`].
pub const LISTENER_ERROR: &str = "system:listener-error";
/// Admin configuration changed in bulk (plugins are refreshed afterwards).
pub const CONFIG_CHANGED: &str = "system:config-changed";

/// Data carried by a `system:listener-error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerErrorPayload {
    /// The listener that failed.
    pub listener_id: ListenerId,
    /// The plugin owning that listener.
    pub plugin_id: String,
    /// Type of the event being dispatched when it failed.
    pub event_type: String,
    /// Id of the event being dispatched when it failed.
    pub event_id: EventId,
    /// Error message.
    pub error: String,
}
