//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use quill_cms::app::build_app;
use quill_core::config::{AppConfig, PluginManifest};
use quill_plugin::{Kernel, PluginCatalog};
use quill_plugin_sdk::prelude::*;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// The kernel behind the router
    pub kernel: Kernel,
}

/// Decoded response
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Content type, if any
    pub content_type: Option<String>,
    /// Body parsed as JSON, or a JSON string for non-JSON bodies
    pub body: Value,
}

impl TestApp {
    /// Create a test application with the greeter plugin installed.
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.plugins.modules = vec![
            PluginManifest::new("greeter")
                .activated()
                .with_setting("greeting", json!("Hello")),
        ];

        let catalog = PluginCatalog::new().register("greeter", Greeter::create);
        let (kernel, router) = build_app(config, catalog);
        kernel
            .manager
            .refresh_plugins()
            .await
            .expect("Failed to load plugins");

        Self { router, kernel }
    }

    /// Send a request and decode the response
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("Failed to build request"))
            .await
            .expect("Request failed");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            content_type,
            body,
        }
    }
}

/// Plugin exposing a few routes and settings.
pub struct Greeter {
    config: PluginConfig,
}

impl Greeter {
    /// Factory registered in the catalog.
    pub fn create() -> Arc<dyn Plugin> {
        Arc::new(Self {
            config: plugin_config!(
                id: "greeter",
                name: "Greeter",
                version: "1.0.0",
                description: "Says hello",
                settings: [
                    SettingDeclaration::new("greeting", SettingKind::String).required(),
                    SettingDeclaration::new("api_key", SettingKind::Secret),
                    SettingDeclaration::new("max_length", SettingKind::Integer)
                        .default_value(json!(40))
                        .validation(SettingValidation {
                            min: Some(1.0),
                            max: Some(100.0),
                            ..SettingValidation::default()
                        }),
                ]
            ),
        })
    }
}

struct Hello;

#[async_trait]
impl RouteHandler for Hello {
    async fn handle(
        &self,
        req: &PluginRequest,
        res: &mut dyn PluginResponse,
        ctx: &PluginContext,
    ) -> AppResult<()> {
        let greeting = ctx.get_setting("greeting", json!("Hi")).await?;
        let name = req.param("name").unwrap_or("world");
        let text = format!("{} {}", greeting.as_str().unwrap_or("Hi"), name);

        let text = ctx
            .run_hook_chain("greeter:text", json!(text), &HookContext::new())
            .await;
        res.set_header("x-plugin", "greeter").json(json!({ "text": text }));
        Ok(())
    }
}

struct Echo;

#[async_trait]
impl RouteHandler for Echo {
    async fn handle(
        &self,
        req: &PluginRequest,
        res: &mut dyn PluginResponse,
        _ctx: &PluginContext,
    ) -> AppResult<()> {
        if req.body.is_null() {
            return Err(AppError::validation("Body required"));
        }
        res.status(201).json(json!({
            "body": req.body,
            "tag": req.query_param("tag"),
        }));
        Ok(())
    }
}

struct Plain;

#[async_trait]
impl RouteHandler for Plain {
    async fn handle(
        &self,
        _req: &PluginRequest,
        res: &mut dyn PluginResponse,
        _ctx: &PluginContext,
    ) -> AppResult<()> {
        res.send("plain text".to_string());
        Ok(())
    }
}

#[async_trait]
impl Plugin for Greeter {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    async fn register_hooks(&self, registrar: &mut PluginRegistrar) -> AppResult<()> {
        registrar
            .register_hook_fn("greeter:text", DEFAULT_HOOK_PRIORITY, |value: Value, _ctx: &HookContext| async move {
                let text = value.as_str().unwrap_or_default();
                Ok(HookResult::continue_with(json!(format!("{text}!"))))
            })
            .await?;
        Ok(())
    }

    fn routes(&self) -> Vec<RouteDefinition> {
        vec![
            RouteDefinition::get("/hello/:name", Arc::new(Hello)),
            RouteDefinition::post("/echo", Arc::new(Echo)),
            RouteDefinition::get("/plain", Arc::new(Plain)),
        ]
    }
}
