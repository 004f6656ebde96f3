//! # quill-core
//!
//! Core crate for the Quill CMS extensibility kernel. Contains the event
//! envelope and named event catalogs, priority levels, configuration
//! schemas, typed identifiers, the collaborator traits the kernel consumes
//! (settings store, plugin manifest source) with in-memory implementations,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Quill crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod stores;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use events::{Event, EventPriority};
pub use result::AppResult;
