//! wshub gateway binary.
//!
//! - WebSocket endpoint: /v1/ws?user_id=...&session_id=...
//! - Ops: /healthz, /readyz, /metrics
//! - Liveness monitor started before serving, stopped on shutdown

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use wshub_core::error::{HubError, Result};
use wshub_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load_from_env()?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| HubError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = AppState::new(cfg)?;
    state.start().await;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "wshub-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| HubError::Internal(format!("bind {listen} failed: {e}")))?;

    // Upgraded sessions are closed by the hub, not by axum's drain.
    let drain = async move {
        shutdown_signal().await;
        state.shutdown().await;
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(drain)
        .await
        .map_err(|e| HubError::Internal(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
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
    tracing::info!("signal received, starting graceful shutdown");
}
