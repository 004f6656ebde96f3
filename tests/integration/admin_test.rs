//! Integration tests for the plugin administration API.

mod helpers;

use axum::http::StatusCode;

#[tokio::test]
async fn test_list_plugins_shows_status_badges() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/admin/plugins", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let plugins = response.body["data"].as_array().unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0]["id"], "greeter");
    assert_eq!(plugins[0]["status"], "active");
    assert_eq!(plugins[0]["version"], "1.0.0");
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request("POST", "/api/admin/plugins/greeter/deactivate", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "inactive");
    assert_eq!(app.kernel.hooks.plugin_entry_count("greeter").await, 0);

    let response = app
        .request("POST", "/api/admin/plugins/greeter/deactivate", None)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "CONFLICT");

    let response = app
        .request("POST", "/api/admin/plugins/greeter/activate", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "active");
}

#[tokio::test]
async fn test_unknown_plugin_is_not_found() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/admin/plugins/nope", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .request("POST", "/api/admin/plugins/nope/activate", None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uninstall_then_refresh_restores() {
    let app = helpers::TestApp::new().await;

    let response = app.request("DELETE", "/api/admin/plugins/greeter", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.kernel.manager.list_plugins().await.is_empty());

    let response = app.request("POST", "/api/admin/plugins/refresh", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["activated"][0], "greeter");
    assert_eq!(app.kernel.hooks.plugin_entry_count("greeter").await, 1);
}

#[tokio::test]
async fn test_event_history_and_metrics() {
    let app = helpers::TestApp::new().await;

    let response = app
        .request("GET", "/api/admin/events/history?type=plugin:activated", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let events = response.body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "plugin:activated");
    assert_eq!(events[0]["data"]["plugin_id"], "greeter");

    let response = app.request("GET", "/api/admin/events/metrics", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["total_events"], 2);

    let response = app.request("DELETE", "/api/admin/events/history", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.request("GET", "/api/admin/events/history", None).await;
    assert!(response.body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_hooks_and_routes_listing() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/admin/hooks", None).await;
    assert_eq!(response.body["data"][0]["hook"], "greeter:text");
    assert_eq!(response.body["data"][0]["handlers"], 1);

    let response = app.request("GET", "/api/admin/routes", None).await;
    // three plugin routes plus settings GET/PUT
    assert_eq!(response.body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_health() {
    let app = helpers::TestApp::new().await;
    let response = app.request("GET", "/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["plugins"], 1);
}
