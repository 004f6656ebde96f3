//! Plugin administration handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use quill_core::error::AppError;
use quill_plugin::{PluginSummary, RefreshReport};

use crate::http::error::ApiError;
use crate::http::response::ApiResponse;
use crate::http::state::AppState;

/// GET /api/admin/plugins
pub async fn list_plugins(State(state): State<AppState>) -> Json<ApiResponse<Vec<PluginSummary>>> {
    Json(ApiResponse::ok(state.kernel.manager.list_plugins().await))
}

/// GET /api/admin/plugins/{id}
pub async fn get_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PluginSummary>>, ApiError> {
    Ok(Json(ApiResponse::ok(summary(&state, &id).await?)))
}

/// POST /api/admin/plugins/{id}/activate
///
/// Loads the plugin from the module store first when it is not loaded yet.
pub async fn activate_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PluginSummary>>, ApiError> {
    let manager = &state.kernel.manager;
    if manager.status(&id).await.is_none() {
        manager.load_plugin(&id).await?;
    }
    manager.activate(&id).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &id).await?)))
}

/// POST /api/admin/plugins/{id}/deactivate
pub async fn deactivate_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PluginSummary>>, ApiError> {
    state.kernel.manager.deactivate(&id).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &id).await?)))
}

/// DELETE /api/admin/plugins/{id}
pub async fn uninstall_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    state.kernel.manager.uninstall(&id).await?;
    Ok(Json(ApiResponse::ok(json!({ "message": "Plugin uninstalled" }))))
}

/// POST /api/admin/plugins/refresh
pub async fn refresh_plugins(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshReport>>, ApiError> {
    let report = state.kernel.manager.refresh_plugins().await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/admin/hooks
pub async fn list_hooks(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let hooks = &state.kernel.hooks;
    let mut entries = Vec::new();
    for name in hooks.registered_hooks().await {
        let handlers = hooks.handler_count(&name).await;
        entries.push(json!({ "hook": name, "handlers": handlers }));
    }
    Json(ApiResponse::ok(Value::Array(entries)))
}

/// GET /api/admin/routes
pub async fn list_routes(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let routes = state.kernel.routes.mounted_routes().await;
    Json(ApiResponse::ok(json!(routes)))
}

async fn summary(state: &AppState, id: &str) -> Result<PluginSummary, AppError> {
    state
        .kernel
        .manager
        .list_plugins()
        .await
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| AppError::not_found(format!("Plugin '{id}' is not loaded")))
}
