//! Media event names.

/// A file was uploaded to a storage provider.
pub const UPLOADED: &str = "media:uploaded";
/// A file was removed from a storage provider.
pub const DELETED: &str = "media:deleted";
/// Files were migrated between storage providers.
pub const MIGRATED: &str = "media:migrated";
