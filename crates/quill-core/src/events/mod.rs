//! Event vocabulary shared by the kernel and plugins.
//!
//! An [`Event`] is an immutable record of something that happened. Its
//! `event_type` is a namespaced `"<domain>:<action>"` string; the named
//! catalogs below (`system`, `plugin`, `content`, `user`, `media`) list the
//! names the host emits. Plugins may emit their own names as long as they
//! follow the same convention.

pub mod content;
pub mod media;
pub mod plugin;
pub mod priority;
pub mod system;
pub mod user;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::EventId;

pub use priority::EventPriority;
pub use system::ListenerErrorPayload;

/// Subscription name matching every event type.
pub const WILDCARD: &str = "*";

/// Source identifier used by events the host itself emits.
pub const SYSTEM_SOURCE: &str = "system";

/// An immutable record of a domain occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID, generated at emission time.
    pub id: EventId,
    /// Namespaced event type, e.g. `content:created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Emitter: a plugin id or `"system"`.
    pub source: String,
    /// Payload; its shape is defined by the event type.
    pub data: Value,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Free-form side channel (user id, session id, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Event {
    /// Create a new event stamped with a fresh id and the current time.
    pub fn new(
        event_type: impl Into<String>,
        data: Value,
        source: impl Into<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            source: source.into(),
            data,
            timestamp: Utc::now(),
            metadata,
        }
    }

    /// Returns the domain part of the type (`content` for `content:created`).
    pub fn domain(&self) -> &str {
        self.event_type
            .split_once(':')
            .map(|(domain, _)| domain)
            .unwrap_or(&self.event_type)
    }

    /// Returns the action part of the type (`created` for `content:created`).
    pub fn action(&self) -> &str {
        self.event_type
            .split_once(':')
            .map(|(_, action)| action)
            .unwrap_or("")
    }
}

/// Validates a hook or event name against the `"<domain>:<action>"`
/// convention. The wildcard is accepted only when `allow_wildcard` is set
/// (subscriptions may use it, emissions may not).
pub fn validate_event_name(name: &str, allow_wildcard: bool) -> AppResult<()> {
    if name == WILDCARD {
        return if allow_wildcard {
            Ok(())
        } else {
            Err(AppError::validation("The wildcard '*' cannot be emitted"))
        };
    }

    match name.split_once(':') {
        Some((domain, action))
            if !domain.is_empty() && !action.is_empty() && !action.contains(':') =>
        {
            Ok(())
        }
        _ => Err(AppError::validation(format!(
            "Invalid name '{name}': expected '<domain>:<action>'"
        ))),
    }
}
