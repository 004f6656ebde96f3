//! Request handlers.

pub mod bridge;
pub mod events;
pub mod health;
pub mod plugins;
