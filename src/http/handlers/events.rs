//! Event history and metrics handlers.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use quill_core::events::Event;
use quill_plugin::events::{EventMetricsSnapshot, HistoryFilter};

use crate::http::response::ApiResponse;
use crate::http::state::AppState;

/// Query parameters for the history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Exact event type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Exact source.
    pub source: Option<String>,
    /// Maximum number of events.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn into_filter(self) -> HistoryFilter {
        let mut filter = HistoryFilter::new();
        filter.event_type = self.event_type;
        filter.source = self.source;
        filter.limit = self.limit;
        filter
    }
}

/// GET /api/admin/events/history
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<Vec<Event>>> {
    let events = state.kernel.events.get_event_history(&query.into_filter());
    Json(ApiResponse::ok(events))
}

/// DELETE /api/admin/events/history
pub async fn clear_history(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    state.kernel.events.clear_history();
    Json(ApiResponse::ok(json!({ "message": "Event history cleared" })))
}

/// GET /api/admin/events/metrics
pub async fn metrics(State(state): State<AppState>) -> Json<ApiResponse<EventMetricsSnapshot>> {
    Json(ApiResponse::ok(state.kernel.events.get_metrics()))
}
