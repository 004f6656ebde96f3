//! Integration tests for plugin routes served through the HTTP adapter.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_plugin_route_with_params_and_hooks() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/plugins/greeter/hello/ada", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "text": "Hello ada!" }));
}

#[tokio::test]
async fn test_post_body_status_and_query() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/plugins/greeter/echo?tag=a%20b",
            Some(json!({ "title": "Draft" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["body"]["title"], "Draft");
    assert_eq!(response.body["tag"], "a b");
}

#[tokio::test]
async fn test_handler_error_is_mapped() {
    let app = helpers::TestApp::new().await;

    let response = app.request("POST", "/plugins/greeter/echo", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_text_response() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/plugins/greeter/plain", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!("plain text"));
    assert_eq!(
        response.content_type.as_deref(),
        Some("text/plain; charset=utf-8")
    );
}

#[tokio::test]
async fn test_unmatched_and_inactive_routes_are_not_found() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/plugins/greeter/missing", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    app.kernel.manager.deactivate("greeter").await.unwrap();
    let response = app.request("GET", "/plugins/greeter/hello/ada", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_settings_roundtrip_masks_secrets() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "PUT",
            "/plugins/greeter/settings",
            Some(json!({ "greeting": "Howdy", "api_key": "s3cr3t" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["values"]["greeting"], "Howdy");
    assert_eq!(response.body["values"]["api_key"], "********");
    assert_eq!(response.body["values"]["max_length"], 40);

    let response = app.request("GET", "/plugins/greeter/hello/bob", None).await;
    assert_eq!(response.body["text"], "Howdy bob!");

    let updates = app
        .request("GET", "/api/admin/events/history?type=plugin:settings-updated", None)
        .await;
    assert_eq!(updates.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request(
            "PUT",
            "/plugins/greeter/settings",
            Some(json!({ "max_length": 500 })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["violations"][0]["key"], "max_length");

    let response = app.request("GET", "/plugins/greeter/settings", None).await;
    assert_eq!(response.body["values"]["max_length"], 40);
}
