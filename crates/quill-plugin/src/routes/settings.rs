//! Built-in per-plugin settings routes.
//!
//! `GET` returns the declarations and effective values (secrets masked).
//! `PUT` validates a partial object against the declarations, persists it
//! and emits `plugin:settings-updated`. Secrets sent back as the mask keep
//! their stored value.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;

use quill_core::error::AppError;
use quill_core::events::{SYSTEM_SOURCE, plugin};
use quill_core::result::AppResult;

use super::bridge::RouteHandler;
use super::request::{Method, PluginRequest, PluginResponse};
use crate::api::context::PluginContext;
use crate::settings::{is_masked_secret, mask_secrets, validate_settings};

/// Path of the settings routes relative to a plugin's mount point.
pub const SETTINGS_PATH: &str = "/settings";

/// Handler for `GET` and `PUT {prefix}/{plugin_id}/settings`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SettingsRoute;

#[async_trait]
impl RouteHandler for SettingsRoute {
    async fn handle(
        &self,
        req: &PluginRequest,
        res: &mut dyn PluginResponse,
        ctx: &PluginContext,
    ) -> AppResult<()> {
        match req.method {
            Method::Get => {
                res.json(settings_document(ctx).await?);
                Ok(())
            }
            Method::Put => update(req, res, ctx).await,
            other => Err(AppError::validation(format!(
                "Method {other} is not supported on settings"
            ))),
        }
    }
}

async fn settings_document(ctx: &PluginContext) -> AppResult<Value> {
    let mut values = ctx.settings().await?;
    mask_secrets(ctx.declarations(), &mut values);

    Ok(json!({
        "plugin_id": ctx.plugin_id(),
        "declarations": ctx.declarations(),
        "values": values,
    }))
}

async fn update(
    req: &PluginRequest,
    res: &mut dyn PluginResponse,
    ctx: &PluginContext,
) -> AppResult<()> {
    let Value::Object(values) = &req.body else {
        return Err(AppError::validation("Settings body must be a JSON object"));
    };

    let updates: Map<String, Value> = values
        .iter()
        .filter(|(key, value)| !is_masked_secret(ctx.declarations(), key, value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let violations = validate_settings(ctx.declarations(), &updates);
    if !violations.is_empty() {
        res.status(422).json(json!({
            "error": "Invalid settings",
            "violations": violations,
        }));
        return Ok(());
    }

    for (key, value) in &updates {
        ctx.set_setting(key, value.clone()).await?;
    }

    let keys: Vec<&String> = updates.keys().collect();
    info!(plugin_id = %ctx.plugin_id(), keys = ?keys, "Plugin settings updated");

    ctx.events()
        .emit_event(
            plugin::SETTINGS_UPDATED,
            json!({ "plugin_id": ctx.plugin_id(), "keys": keys }),
            SYSTEM_SOURCE,
            None,
        )
        .await?;

    res.json(settings_document(ctx).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use quill_core::stores::MemorySettingsStore;

    use crate::events::HistoryFilter;
    use crate::events::manager::EventManager;
    use crate::hooks::registry::HookRegistry;
    use crate::routes::request::BufferedResponse;
    use crate::settings::{SettingDeclaration, SettingKind};

    fn context() -> PluginContext {
        PluginContext::new(
            "analytics",
            Arc::new(EventManager::default()),
            Arc::new(HookRegistry::new()),
            Arc::new(MemorySettingsStore::new()),
            vec![
                SettingDeclaration::new("tracking_id", SettingKind::String).required(),
                SettingDeclaration::new("api_key", SettingKind::Secret),
                SettingDeclaration::new("sample_rate", SettingKind::Number)
                    .default_value(json!(1.0)),
            ],
        )
    }

    #[tokio::test]
    async fn test_get_masks_secrets() {
        let ctx = context();
        ctx.set_setting("api_key", json!("s3cr3t")).await.unwrap();

        let mut res = BufferedResponse::new();
        let req = PluginRequest::new(Method::Get, "/plugins/analytics/settings");
        SettingsRoute.handle(&req, &mut res, &ctx).await.unwrap();

        let body = res.json_body().unwrap();
        assert_eq!(body["values"]["api_key"], "********");
        assert_eq!(body["values"]["sample_rate"], 1.0);
        assert_eq!(body["declarations"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_values() {
        let ctx = context();
        let req = PluginRequest::new(Method::Put, "/plugins/analytics/settings")
            .with_body(json!({ "sample_rate": "high", "unknown": 1 }));
        let mut res = BufferedResponse::new();
        SettingsRoute.handle(&req, &mut res, &ctx).await.unwrap();

        assert_eq!(res.status_code(), 422);
        assert_eq!(res.json_body().unwrap()["violations"].as_array().unwrap().len(), 2);
        assert_eq!(ctx.get_setting("sample_rate", Value::Null).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_put_persists_and_emits() {
        let ctx = context();
        let req = PluginRequest::new(Method::Put, "/plugins/analytics/settings")
            .with_body(json!({ "tracking_id": "UA-1", "sample_rate": 0.5 }));
        let mut res = BufferedResponse::new();
        SettingsRoute.handle(&req, &mut res, &ctx).await.unwrap();

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.json_body().unwrap()["values"]["tracking_id"], "UA-1");

        let events = ctx
            .events()
            .get_event_history(&HistoryFilter::new().event_type(plugin::SETTINGS_UPDATED));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data["plugin_id"], "analytics");
        assert_eq!(events[0].source, "system");
    }

    #[tokio::test]
    async fn test_non_object_body_is_rejected() {
        let ctx = context();
        let req = PluginRequest::new(Method::Put, "/plugins/analytics/settings")
            .with_body(json!([1, 2]));
        let err = SettingsRoute
            .handle(&req, &mut BufferedResponse::new(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, quill_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_edited_document_keeps_stored_secret() {
        let ctx = context();
        ctx.set_setting("api_key", json!("real-secret")).await.unwrap();
        ctx.set_setting("tracking_id", json!("UA-1")).await.unwrap();

        let mut res = BufferedResponse::new();
        SettingsRoute
            .handle(
                &PluginRequest::new(Method::Get, "/plugins/analytics/settings"),
                &mut res,
                &ctx,
            )
            .await
            .unwrap();
        let mut values = res.json_body().unwrap()["values"].clone();
        values["sample_rate"] = json!(0.25);

        let req = PluginRequest::new(Method::Put, "/plugins/analytics/settings").with_body(values);
        let mut res = BufferedResponse::new();
        SettingsRoute.handle(&req, &mut res, &ctx).await.unwrap();

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.json_body().unwrap()["values"]["api_key"], "********");
        assert_eq!(ctx.get_setting("api_key", Value::Null).await.unwrap(), "real-secret");
        assert_eq!(ctx.get_setting("sample_rate", Value::Null).await.unwrap(), 0.25);

        let events = ctx
            .events()
            .get_event_history(&HistoryFilter::new().event_type(plugin::SETTINGS_UPDATED));
        let keys = events[0].data["keys"].as_array().unwrap();
        assert!(!keys.contains(&json!("api_key")));
    }

    #[tokio::test]
    async fn test_new_secret_value_replaces_stored_one() {
        let ctx = context();
        ctx.set_setting("api_key", json!("old")).await.unwrap();

        let req = PluginRequest::new(Method::Put, "/plugins/analytics/settings")
            .with_body(json!({ "api_key": "rotated" }));
        SettingsRoute
            .handle(&req, &mut BufferedResponse::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(ctx.get_setting("api_key", Value::Null).await.unwrap(), "rotated");
    }
}
