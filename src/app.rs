//! Server composition: builds the kernel, loads plugins and serves HTTP.

use axum::Router;

use quill_core::config::AppConfig;
use quill_core::error::AppError;
use quill_core::events::system;
use quill_plugin::{Kernel, PluginCatalog};
use serde_json::json;

use crate::http::{AppState, build_router};

/// Builds the kernel and the router for a configuration and plugin catalog.
pub fn build_app(config: AppConfig, catalog: PluginCatalog) -> (Kernel, Router) {
    let kernel = Kernel::builder(&config).catalog(catalog).build();
    let router = build_router(AppState::new(config, kernel.clone()));
    (kernel, router)
}

/// Runs the Quill server until a shutdown signal arrives.
pub async fn run_server(config: AppConfig, catalog: PluginCatalog) -> Result<(), AppError> {
    tracing::info!("Starting Quill v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Kernel + plugins ─────────────────────────────────
    let addr = config.server.bind_address();
    let (kernel, app) = build_app(config, catalog);

    let report = kernel.manager.refresh_plugins().await?;
    tracing::info!(
        loaded = report.loaded.len(),
        activated = report.activated.len(),
        failed = report.failed.len(),
        "Plugins loaded"
    );
    for failure in &report.failed {
        tracing::warn!(plugin_id = %failure.plugin_id, error = %failure.error, "Plugin failed during startup");
    }

    kernel
        .events
        .emit(system::STARTUP, json!({ "version": env!("CARGO_PKG_VERSION") }))
        .await?;

    // ── Step 2: Bind + serve ─────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Quill server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 3: Tear down plugins ────────────────────────────────
    if let Err(e) = kernel.events.emit(system::SHUTDOWN, json!({})).await {
        tracing::warn!(error = %e, "Failed to emit shutdown event");
    }
    kernel.manager.shutdown().await;

    tracing::info!("Quill server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
