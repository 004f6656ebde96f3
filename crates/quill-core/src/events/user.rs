//! User event names.

/// A user account was registered.
pub const REGISTERED: &str = "user:registered";
/// A user logged in.
pub const LOGIN: &str = "user:login";
/// A user logged out.
pub const LOGOUT: &str = "user:logout";
/// A user profile was updated.
pub const UPDATED: &str = "user:updated";
/// A user account was deleted.
pub const DELETED: &str = "user:deleted";
