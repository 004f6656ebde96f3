//! Integration tests for hook chain ordering, halting and failure handling.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use quill_core::error::AppError;
use quill_plugin::hooks::{HookContext, HookHandler, HookPoint, HookRegistry, HookResult};
use quill_plugin::traits::hook_fn;

fn appender(item: &'static str) -> Arc<dyn HookHandler> {
    hook_fn(move |value: Value, _ctx: &HookContext| async move {
        let mut items = value.as_array().cloned().unwrap_or_default();
        items.push(json!(item));
        Ok(HookResult::continue_with(Value::Array(items)))
    })
}

fn tracing_step(log: &Arc<Mutex<Vec<i32>>>, tag: i32) -> Arc<dyn HookHandler> {
    let log = log.clone();
    hook_fn(move |value: Value, _ctx: &HookContext| {
        log.lock().unwrap().push(tag);
        async move { Ok(HookResult::continue_with(value)) }
    })
}

#[tokio::test]
async fn test_chain_runs_by_ascending_priority() {
    let hooks = HookRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for priority in [90, 10, 50, 0, 100, 25] {
        hooks
            .register("content:before-save", "test", priority, tracing_step(&log, priority))
            .await
            .unwrap();
    }

    hooks
        .run_hook_chain("content:before-save", json!({}), &HookContext::new())
        .await;

    assert_eq!(*log.lock().unwrap(), vec![0, 10, 25, 50, 90, 100]);
}

#[tokio::test]
async fn test_admin_menu_scenario_keeps_registration_order() {
    let hooks = HookRegistry::new();
    hooks
        .register(HookPoint::AdminMenu, "oauth", 10, appender("oauth"))
        .await
        .unwrap();
    hooks
        .register(HookPoint::AdminMenu, "seo", 10, appender("seo"))
        .await
        .unwrap();

    let menu = hooks
        .run_hook_chain("admin:menu", json!([]), &HookContext::new())
        .await;
    assert_eq!(menu, json!(["oauth", "seo"]));
}

async fn halting_chain(second_modifies: bool) -> (Value, Vec<i32>) {
    let hooks = HookRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first_log = log.clone();
    hooks
        .register(
            HookPoint::ContentBeforeRender,
            "a",
            1,
            hook_fn(move |_value: Value, _ctx: &HookContext| {
                first_log.lock().unwrap().push(1);
                async { Ok(HookResult::continue_with(json!("from-1"))) }
            }),
        )
        .await
        .unwrap();

    let second_log = log.clone();
    hooks
        .register(
            HookPoint::ContentBeforeRender,
            "b",
            2,
            hook_fn(move |_value: Value, _ctx: &HookContext| {
                second_log.lock().unwrap().push(2);
                async move {
                    Ok(HookResult {
                        data: json!("from-2"),
                        modified: second_modifies,
                        stop: true,
                    })
                }
            }),
        )
        .await
        .unwrap();

    hooks
        .register(HookPoint::ContentBeforeRender, "c", 3, tracing_step(&log, 3))
        .await
        .unwrap();

    let out = hooks
        .run_hook_chain(HookPoint::ContentBeforeRender, json!("input"), &HookContext::new())
        .await;
    let calls = log.lock().unwrap().clone();
    (out, calls)
}

#[tokio::test]
async fn test_stop_halts_chain_with_modified_output() {
    let (out, calls) = halting_chain(true).await;
    assert_eq!(out, json!("from-2"));
    assert_eq!(calls, vec![1, 2]);
}

#[tokio::test]
async fn test_stop_without_modified_keeps_previous_output() {
    let (out, calls) = halting_chain(false).await;
    assert_eq!(out, json!("from-1"));
    assert_eq!(calls, vec![1, 2]);
}

#[tokio::test]
async fn test_failing_entry_is_a_noop() {
    let hooks = HookRegistry::new();
    hooks
        .register(HookPoint::MediaUrl, "cdn", 10, appender("cdn"))
        .await
        .unwrap();
    hooks
        .register(
            HookPoint::MediaUrl,
            "broken",
            20,
            hook_fn(|_value: Value, _ctx: &HookContext| async {
                Err(AppError::internal("cannot rewrite"))
            }),
        )
        .await
        .unwrap();
    hooks
        .register(HookPoint::MediaUrl, "watermark", 30, appender("watermark"))
        .await
        .unwrap();

    let out = hooks
        .run_hook_chain(HookPoint::MediaUrl, json!([]), &HookContext::new())
        .await;
    assert_eq!(out, json!(["cdn", "watermark"]));
}

#[tokio::test]
async fn test_unregister_plugin_strips_every_hook() {
    let hooks = HookRegistry::new();
    hooks.register(HookPoint::AdminMenu, "seo", 10, appender("a")).await.unwrap();
    hooks.register(HookPoint::AdminDashboard, "seo", 10, appender("b")).await.unwrap();
    hooks.register("seo:sitemap", "seo", 10, appender("c")).await.unwrap();
    hooks.register(HookPoint::AdminMenu, "oauth", 10, appender("d")).await.unwrap();

    assert_eq!(hooks.plugin_entry_count("seo").await, 3);
    assert_eq!(hooks.unregister_plugin("seo").await, 3);
    assert_eq!(hooks.plugin_entry_count("seo").await, 0);
    assert_eq!(hooks.handler_count(HookPoint::AdminMenu).await, 1);
    assert_eq!(hooks.registered_hooks().await, vec!["admin:menu".to_string()]);
}

#[tokio::test]
async fn test_invalid_hook_names_are_rejected() {
    let hooks = HookRegistry::new();
    assert!(hooks.register("*", "a", 10, appender("x")).await.is_err());
    assert!(hooks.register("menu", "a", 10, appender("x")).await.is_err());
    assert!(!hooks.has_handlers("menu").await);
}
