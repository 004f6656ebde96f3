//! Hook system: registry, chain runner and well-known hook points.

pub mod chain;
pub mod definitions;
pub mod registry;

pub use definitions::{HookContext, HookPoint, HookResult};
pub use registry::{DEFAULT_HOOK_PRIORITY, HookHandler, HookRegistry};
