//! Fallback handler adapting HTTP requests to the plugin route bridge.

use std::collections::BTreeMap;

use axum::body::{Body, to_bytes};
use axum::extract::{Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tracing::warn;

use quill_core::error::AppError;
use quill_plugin::routes::{BufferedResponse, Method, PluginRequest, ResponseBody};

use crate::http::error::ApiError;
use crate::http::state::AppState;

/// Dispatches any request not matched by the admin API to plugin routes.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let no_route = || AppError::not_found(format!("No route for {} {}", parts.method, parts.uri.path()));
    let method: Method = parts.method.as_str().parse().map_err(|_| no_route())?;

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let query = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .map_err(|e| AppError::validation(format!("Invalid query string: {e}")))?;

    let bytes = to_bytes(body, state.config.server.body_limit_bytes)
        .await
        .map_err(|e| AppError::validation(format!("Failed to read request body: {e}")))?;

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));
    let body = if bytes.is_empty() {
        Value::Null
    } else if is_json {
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))?
    } else {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    };

    let mut req = PluginRequest::new(method, url)
        .with_query(query)
        .with_body(body);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            req = req.with_header(name.as_str(), value);
        }
    }

    let mut res = BufferedResponse::new();
    if !state.kernel.routes.dispatch(&mut req, &mut res).await? {
        return Err(no_route().into());
    }

    into_http(res)
}

/// Converts a buffered plugin response into an HTTP response.
fn into_http(res: BufferedResponse) -> Result<Response, ApiError> {
    let (status, headers, body) = res.into_parts();

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, value) in headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => warn!(header = %name, "Dropping invalid header from plugin response"),
        }
    }

    let body = match body {
        ResponseBody::Empty => Body::empty(),
        ResponseBody::Json(value) => Body::from(value.to_string()),
        ResponseBody::Text(text) => Body::from(text),
    };

    builder
        .body(body)
        .map_err(|e| AppError::internal(format!("Failed to build response: {e}")).into())
}
