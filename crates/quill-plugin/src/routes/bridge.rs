//! Route bridge: maps active plugins' routes onto the host's dispatch surface.
//!
//! Routes are mounted under `{prefix}/{plugin_id}` when a plugin activates
//! and unmounted when it deactivates. Every plugin also gets the built-in
//! settings routes `GET` and `PUT {prefix}/{plugin_id}/settings`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use quill_core::error::AppError;
use quill_core::result::AppResult;

use super::request::{Method, PluginRequest, PluginResponse};
use super::settings::{SETTINGS_PATH, SettingsRoute};
use crate::api::context::PluginContext;
use crate::guard::guarded;

/// Trait for plugin route handlers.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Handles one request. Returning an error lets the host render it.
    async fn handle(
        &self,
        req: &PluginRequest,
        res: &mut dyn PluginResponse,
        ctx: &PluginContext,
    ) -> AppResult<()>;
}

/// A route declared by a plugin, relative to its mount point.
#[derive(Clone)]
pub struct RouteDefinition {
    /// Method to match.
    pub method: Method,
    /// Path relative to `{prefix}/{plugin_id}`; `:name` segments capture.
    pub path: String,
    /// Handler invoked on a match.
    pub handler: Arc<dyn RouteHandler>,
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RouteDefinition {
    /// Creates a route.
    pub fn new(method: Method, path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }

    /// GET route.
    pub fn get(path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::Get, path, handler)
    }

    /// POST route.
    pub fn post(path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::Post, path, handler)
    }

    /// PUT route.
    pub fn put(path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::Put, path, handler)
    }

    /// DELETE route.
    pub fn delete(path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::Delete, path, handler)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route path with `:param` captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parses a path such as `/posts/:id/comments`.
    pub fn parse(path: &str) -> AppResult<Self> {
        if !path.starts_with('/') {
            return Err(AppError::validation(format!(
                "Route path '{path}' must start with '/'"
            )));
        }

        let mut segments = Vec::new();
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            match raw.strip_prefix(':') {
                Some("") => {
                    return Err(AppError::validation(format!(
                        "Route path '{path}' has an unnamed parameter"
                    )));
                }
                Some(name) => {
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(AppError::validation(format!(
                            "Route path '{path}' repeats parameter '{name}'"
                        )));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self { segments })
    }

    /// Matches a concrete path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// Whether two patterns can match the same path.
    fn overlaps(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    _ => true,
                })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => write!(f, "/{literal}")?,
                Segment::Param(name) => write!(f, "/:{name}")?,
            }
        }
        Ok(())
    }
}

struct MountedRoute {
    plugin_id: String,
    method: Method,
    pattern: RoutePattern,
    handler: Arc<dyn RouteHandler>,
    context: PluginContext,
}

/// A mounted route as listed by admin tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedRouteInfo {
    /// Owning plugin.
    pub plugin_id: String,
    /// Method.
    pub method: Method,
    /// Full path including prefix and plugin id.
    pub path: String,
}

/// Table of mounted plugin routes.
pub struct RouteBridge {
    prefix: String,
    routes: RwLock<Vec<MountedRoute>>,
}

impl fmt::Debug for RouteBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBridge")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RouteBridge {
    /// Creates a bridge mounting plugins under `prefix` (e.g. `/plugins`).
    pub fn new(prefix: &str) -> Self {
        let prefix = format!("/{}", prefix.trim_matches('/'));
        Self {
            prefix: if prefix == "/" { String::new() } else { prefix },
            routes: RwLock::new(Vec::new()),
        }
    }

    /// The mount prefix, without trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Mounts `routes` plus the built-in settings routes for the plugin
    /// owning `ctx`. Nothing is mounted if any route is invalid or clashes
    /// with an already mounted one.
    pub async fn mount(&self, ctx: &PluginContext, routes: Vec<RouteDefinition>) -> AppResult<usize> {
        let plugin_id = ctx.plugin_id();
        let base = format!("{}/{}", self.prefix, plugin_id);

        let settings_handler: Arc<dyn RouteHandler> = Arc::new(SettingsRoute);
        let builtins = [
            RouteDefinition::get(SETTINGS_PATH, settings_handler.clone()),
            RouteDefinition::put(SETTINGS_PATH, settings_handler),
        ];

        let mut pending: Vec<MountedRoute> = Vec::new();
        for route in routes.into_iter().chain(builtins) {
            let relative = route.path.trim_matches('/');
            let pattern = if relative.is_empty() {
                RoutePattern::parse(&base)?
            } else {
                RoutePattern::parse(&format!("{base}/{relative}"))?
            };

            if pending
                .iter()
                .any(|p| p.method == route.method && p.pattern.overlaps(&pattern))
            {
                return Err(AppError::conflict(format!(
                    "Plugin '{plugin_id}' declares {} {pattern} more than once",
                    route.method
                )));
            }

            pending.push(MountedRoute {
                plugin_id: plugin_id.to_string(),
                method: route.method,
                pattern,
                handler: route.handler,
                context: ctx.clone(),
            });
        }

        let mut mounted = self.routes.write().await;
        if mounted.iter().any(|m| m.plugin_id == plugin_id) {
            return Err(AppError::conflict(format!(
                "Routes for plugin '{plugin_id}' are already mounted"
            )));
        }

        let count = pending.len();
        mounted.extend(pending);

        info!(plugin_id = %plugin_id, routes = count, base = %base, "Plugin routes mounted");
        Ok(count)
    }

    /// Removes every route owned by a plugin. Returns how many were removed.
    pub async fn unmount(&self, plugin_id: &str) -> usize {
        let mut mounted = self.routes.write().await;
        let before = mounted.len();
        mounted.retain(|m| m.plugin_id != plugin_id);
        let removed = before - mounted.len();

        if removed > 0 {
            info!(plugin_id = %plugin_id, removed, "Plugin routes unmounted");
        }
        removed
    }

    /// Dispatches a request to the first matching route.
    ///
    /// Returns `Ok(false)` when no route matches. Handler errors are
    /// returned; a panicking handler is reported as a plugin error.
    pub async fn dispatch(
        &self,
        req: &mut PluginRequest,
        res: &mut dyn PluginResponse,
    ) -> AppResult<bool> {
        let matched = {
            let mounted = self.routes.read().await;
            mounted.iter().find_map(|m| {
                if m.method != req.method {
                    return None;
                }
                m.pattern.matches(&req.path).map(|params| {
                    (params, m.handler.clone(), m.context.clone())
                })
            })
        };

        let Some((params, handler, ctx)) = matched else {
            debug!(method = %req.method, path = %req.path, "No plugin route matched");
            return Ok(false);
        };

        req.params = params;
        debug!(
            plugin_id = %ctx.plugin_id(),
            method = %req.method,
            path = %req.path,
            "Dispatching plugin route"
        );

        let request: &PluginRequest = req;
        guarded(handler.handle(request, res, &ctx), None)
            .await
            .map_err(|failure| {
                warn!(
                    plugin_id = %ctx.plugin_id(),
                    path = %request.path,
                    error = %failure,
                    "Plugin route failed"
                );
                AppError::from(failure)
            })?;

        Ok(true)
    }

    /// Lists mounted routes in mount order.
    pub async fn mounted_routes(&self) -> Vec<MountedRouteInfo> {
        let mounted = self.routes.read().await;
        mounted
            .iter()
            .map(|m| MountedRouteInfo {
                plugin_id: m.plugin_id.clone(),
                method: m.method,
                path: m.pattern.to_string(),
            })
            .collect()
    }

    /// Number of routes mounted for a plugin.
    pub async fn plugin_route_count(&self, plugin_id: &str) -> usize {
        let mounted = self.routes.read().await;
        mounted.iter().filter(|m| m.plugin_id == plugin_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use quill_core::error::ErrorKind;
    use quill_core::stores::MemorySettingsStore;

    use crate::events::manager::EventManager;
    use crate::hooks::registry::HookRegistry;
    use crate::routes::request::BufferedResponse;

    struct Echo;

    #[async_trait]
    impl RouteHandler for Echo {
        async fn handle(
            &self,
            req: &PluginRequest,
            res: &mut dyn PluginResponse,
            ctx: &PluginContext,
        ) -> AppResult<()> {
            res.json(json!({ "plugin": ctx.plugin_id(), "params": req.params }));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl RouteHandler for Failing {
        async fn handle(
            &self,
            _req: &PluginRequest,
            _res: &mut dyn PluginResponse,
            _ctx: &PluginContext,
        ) -> AppResult<()> {
            Err(AppError::not_found("no such post"))
        }
    }

    fn context(id: &str) -> PluginContext {
        PluginContext::new(
            id,
            Arc::new(EventManager::default()),
            Arc::new(HookRegistry::new()),
            Arc::new(MemorySettingsStore::new()),
            Vec::new(),
        )
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = RoutePattern::parse("/plugins/seo/posts/:id/meta").unwrap();
        let params = pattern.matches("/plugins/seo/posts/42/meta").unwrap();
        assert_eq!(params["id"], "42");
        assert!(pattern.matches("/plugins/seo/posts/42").is_none());
        assert!(pattern.matches("/plugins/oauth/posts/42/meta").is_none());
        assert_eq!(pattern.to_string(), "/plugins/seo/posts/:id/meta");

        assert!(RoutePattern::parse("no-slash").is_err());
        assert!(RoutePattern::parse("/a/:").is_err());
        assert!(RoutePattern::parse("/a/:id/:id").is_err());
    }

    #[tokio::test]
    async fn test_mount_dispatch_unmount() {
        let bridge = RouteBridge::new("/plugins/");
        let ctx = context("seo");
        let count = bridge
            .mount(&ctx, vec![RouteDefinition::get("/posts/:id", Arc::new(Echo))])
            .await
            .unwrap();
        assert_eq!(count, 3);

        let mut req = PluginRequest::new(Method::Get, "/plugins/seo/posts/7?x=1");
        let mut res = BufferedResponse::new();
        assert!(bridge.dispatch(&mut req, &mut res).await.unwrap());
        assert_eq!(
            res.json_body(),
            Some(&json!({ "plugin": "seo", "params": { "id": "7" } }))
        );

        let mut req = PluginRequest::new(Method::Post, "/plugins/seo/posts/7");
        assert!(!bridge.dispatch(&mut req, &mut BufferedResponse::new()).await.unwrap());

        assert_eq!(bridge.unmount("seo").await, 3);
        let mut req = PluginRequest::new(Method::Get, "/plugins/seo/posts/7");
        assert!(!bridge.dispatch(&mut req, &mut BufferedResponse::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mount_is_all_or_nothing() {
        let bridge = RouteBridge::new("/plugins");
        let ctx = context("seo");
        let err = bridge
            .mount(
                &ctx,
                vec![
                    RouteDefinition::get("/posts/:id", Arc::new(Echo)),
                    RouteDefinition::get("/posts/:slug", Arc::new(Echo)),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(bridge.plugin_route_count("seo").await, 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let bridge = RouteBridge::new("/plugins");
        bridge
            .mount(&context("blog"), vec![RouteDefinition::get("/missing", Arc::new(Failing))])
            .await
            .unwrap();

        let mut req = PluginRequest::new(Method::Get, "/plugins/blog/missing");
        let err = bridge
            .dispatch(&mut req, &mut BufferedResponse::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_mounted_routes_listing() {
        let bridge = RouteBridge::new("plugins");
        bridge.mount(&context("oauth"), Vec::new()).await.unwrap();

        let routes = bridge.mounted_routes().await;
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.path == "/plugins/oauth/settings"));
    }
}
