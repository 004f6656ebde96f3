//! Closure adapters for hook handlers and event listeners.
//!
//! Plugins with small handlers can pass closures returning futures instead
//! of implementing [`HookHandler`] or [`EventListener`] on a named type.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use quill_core::events::Event;
use quill_core::result::AppResult;

use crate::events::listener::EventListener;
use crate::hooks::definitions::{HookContext, HookResult};
use crate::hooks::registry::HookHandler;

type HookClosure =
    dyn Fn(Value, &HookContext) -> BoxFuture<'static, AppResult<HookResult>> + Send + Sync;

type ListenerClosure = dyn Fn(Arc<Event>) -> BoxFuture<'static, AppResult<()>> + Send + Sync;

/// A closure-based hook handler.
pub struct ClosureHookHandler {
    handler: Box<HookClosure>,
}

impl std::fmt::Debug for ClosureHookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureHookHandler")
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureHookHandler {
    /// Creates a new closure-based handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value, &HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookResult>> + Send + 'static,
    {
        Self {
            handler: Box::new(
                move |value: Value, ctx: &HookContext| -> BoxFuture<'static, _> {
                    Box::pin(handler(value, ctx))
                },
            ),
        }
    }
}

#[async_trait]
impl HookHandler for ClosureHookHandler {
    async fn handle(&self, value: Value, ctx: &HookContext) -> AppResult<HookResult> {
        (self.handler)(value, ctx).await
    }
}

/// A closure-based event listener.
pub struct ClosureListener {
    callback: Box<ListenerClosure>,
}

impl std::fmt::Debug for ClosureListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureListener")
            .field("callback", &"<closure>")
            .finish()
    }
}

impl ClosureListener {
    /// Creates a new closure-based listener.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            callback: Box::new(move |event: Arc<Event>| -> BoxFuture<'static, _> {
                Box::pin(callback(event))
            }),
        }
    }
}

#[async_trait]
impl EventListener for ClosureListener {
    async fn on_event(&self, event: Arc<Event>) -> AppResult<()> {
        (self.callback)(event).await
    }
}

/// Wraps a closure into an `Arc<dyn HookHandler>`.
pub fn hook_fn<F, Fut>(handler: F) -> Arc<dyn HookHandler>
where
    F: Fn(Value, &HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<HookResult>> + Send + 'static,
{
    Arc::new(ClosureHookHandler::new(handler))
}

/// Wraps a closure into an `Arc<dyn EventListener>`.
pub fn listener_fn<F, Fut>(callback: F) -> Arc<dyn EventListener>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Arc::new(ClosureListener::new(callback))
}
