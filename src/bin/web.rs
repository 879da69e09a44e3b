//! maily-web - 编排核心的 HTTP 服务
//!
//! 监听地址取自 [server] bind，可用 MAILY_WEB_BIND 覆盖；Ctrl+C / SIGTERM 时优雅退出。

use std::sync::Arc;

use anyhow::Context;

use maily::api::{create_router, AppState};
use maily::config::{load_config, AppConfig};
use maily::core::shutdown::ShutdownManager;
use maily::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    tracing::info!(
        active_model = %cfg.models.active_model,
        fallbacks = ?cfg.models.fallback_models,
        "Inference chain configured"
    );

    let state = Arc::new(AppState::from_config(&cfg).context("Failed to build app state")?);
    let app = create_router(state);

    let bind = std::env::var("MAILY_WEB_BIND").unwrap_or_else(|_| cfg.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("Maily API: http://{}", bind);

    let manager = Arc::new(ShutdownManager::new());
    manager.install_signal_handlers();
    let shutdown = Arc::clone(&manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Maily API stopped");
    Ok(())
}
