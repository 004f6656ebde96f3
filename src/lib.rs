//! # quill-cms
//!
//! Host process for the Quill extensibility kernel: configuration loading,
//! logging, and an axum adapter that exposes plugin administration and the
//! plugin route bridge over HTTP.

pub mod app;
pub mod http;
