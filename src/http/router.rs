//! Route definitions for the Quill HTTP adapter.
//!
//! The admin API is mounted under `/api`. Every other request falls through
//! to the plugin route bridge.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware;
use super::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let api_routes = Router::new()
        .merge(plugin_routes())
        .merge(event_routes())
        .route("/health", get(handlers::health::health));

    Router::new()
        .nest("/api", api_routes)
        .fallback(handlers::bridge::dispatch)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// Plugin administration: list, activate, deactivate, uninstall, refresh
fn plugin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/plugins", get(handlers::plugins::list_plugins))
        .route("/admin/plugins/refresh", post(handlers::plugins::refresh_plugins))
        .route(
            "/admin/plugins/{id}",
            get(handlers::plugins::get_plugin).delete(handlers::plugins::uninstall_plugin),
        )
        .route("/admin/plugins/{id}/activate", post(handlers::plugins::activate_plugin))
        .route("/admin/plugins/{id}/deactivate", post(handlers::plugins::deactivate_plugin))
        .route("/admin/hooks", get(handlers::plugins::list_hooks))
        .route("/admin/routes", get(handlers::plugins::list_routes))
}

/// Event history and metrics
fn event_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/events/history",
            get(handlers::events::history).delete(handlers::events::clear_history),
        )
        .route("/admin/events/metrics", get(handlers::events::metrics))
}
