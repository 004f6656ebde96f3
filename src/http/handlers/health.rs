//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::http::response::ApiResponse;
use crate::http::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let plugins = state.kernel.manager.list_plugins().await;
    Json(ApiResponse::ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "plugins": plugins.len(),
        "listeners": state.kernel.events.total_listener_count().await,
    })))
}
