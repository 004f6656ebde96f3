//! Content event names.

/// A content item was created.
pub const CREATED: &str = "content:created";
/// A content item was updated.
pub const UPDATED: &str = "content:updated";
/// A content item was deleted.
pub const DELETED: &str = "content:deleted";
/// A content item was published.
pub const PUBLISHED: &str = "content:published";
/// A content item was unpublished.
pub const UNPUBLISHED: &str = "content:unpublished";
