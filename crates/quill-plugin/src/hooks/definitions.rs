//! Well-known hook points, the per-invocation context and handler results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hook points the host runs chains for.
///
/// The registry itself accepts arbitrary `"<domain>:<action>"` names; this
/// catalog only names the ones the host and bundled modules use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPoint {
    // ── Content ──
    /// Transform rendered HTML before it is sent.
    #[serde(rename = "content:before-render")]
    ContentBeforeRender,
    /// Transform a content document before it is persisted.
    #[serde(rename = "content:before-save")]
    ContentBeforeSave,
    /// Transform a content document after it is loaded.
    #[serde(rename = "content:after-load")]
    ContentAfterLoad,

    // ── Admin ──
    /// Extend the admin navigation menu (array of items).
    #[serde(rename = "admin:menu")]
    AdminMenu,
    /// Extend the admin dashboard widgets.
    #[serde(rename = "admin:dashboard")]
    AdminDashboard,

    // ── Media ──
    /// Handle or transform an uploaded file descriptor.
    #[serde(rename = "media:upload")]
    MediaUpload,
    /// Handle a media deletion.
    #[serde(rename = "media:delete")]
    MediaDelete,
    /// Resolve the public URL of a stored media item.
    #[serde(rename = "media:url")]
    MediaUrl,

    // ── User ──
    /// Inspect or enrich login credentials before authentication.
    #[serde(rename = "user:login")]
    UserLogin,
    /// Transform a user's public profile.
    #[serde(rename = "user:profile")]
    UserProfile,
}

impl HookPoint {
    /// Every catalogued hook point.
    pub const ALL: [HookPoint; 10] = [
        Self::ContentBeforeRender,
        Self::ContentBeforeSave,
        Self::ContentAfterLoad,
        Self::AdminMenu,
        Self::AdminDashboard,
        Self::MediaUpload,
        Self::MediaDelete,
        Self::MediaUrl,
        Self::UserLogin,
        Self::UserProfile,
    ];

    /// Returns the wire name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentBeforeRender => "content:before-render",
            Self::ContentBeforeSave => "content:before-save",
            Self::ContentAfterLoad => "content:after-load",
            Self::AdminMenu => "admin:menu",
            Self::AdminDashboard => "admin:dashboard",
            Self::MediaUpload => "media:upload",
            Self::MediaDelete => "media:delete",
            Self::MediaUrl => "media:url",
            Self::UserLogin => "user:login",
            Self::UserProfile => "user:profile",
        }
    }

    /// Looks up a catalogued hook point by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for HookPoint {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Side information passed to every entry of one chain run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookContext {
    /// Name of the hook being run. Filled in by the chain runner.
    pub hook: String,
    /// The user on whose behalf the chain runs, if any.
    pub user_id: Option<String>,
    /// Arbitrary caller-supplied data.
    pub metadata: Map<String, Value>,
}

impl HookContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Inserts a metadata value.
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Gets a metadata value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Gets a string metadata value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Result returned by one hook chain entry.
///
/// `data` replaces the threaded value only when `modified` is set; a
/// handler may compute a value and still decline to apply it. `stop` ends
/// the chain after this entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    /// The value produced by the handler.
    pub data: Value,
    /// Whether `data` should replace the current value.
    pub modified: bool,
    /// Whether the chain should stop after this entry.
    pub stop: bool,
}

impl HookResult {
    /// Leaves the value untouched and lets the chain continue.
    pub fn continue_execution() -> Self {
        Self {
            data: Value::Null,
            modified: false,
            stop: false,
        }
    }

    /// Replaces the value and lets the chain continue.
    pub fn continue_with(data: Value) -> Self {
        Self {
            data,
            modified: true,
            stop: false,
        }
    }

    /// Leaves the value untouched and stops the chain.
    pub fn halt() -> Self {
        Self {
            data: Value::Null,
            modified: false,
            stop: true,
        }
    }

    /// Replaces the value and stops the chain.
    pub fn halt_with(data: Value) -> Self {
        Self {
            data,
            modified: true,
            stop: true,
        }
    }
}

impl Default for HookResult {
    fn default() -> Self {
        Self::continue_execution()
    }
}
