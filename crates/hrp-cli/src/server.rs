//! HTTP front door

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use hrp_repo::ChartBackend;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::handlers;

/// Default multipart upload limit (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared request state
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ChartBackend>,
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub max_upload_bytes: usize,
    /// Log every request through `TraceLayer`
    pub trace_requests: bool,
}

/// Build the router over an initialized backend
pub fn router(backend: Arc<dyn ChartBackend>, settings: &ServerSettings) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/index.yaml", get(handlers::get_index))
        .route("/:chart", get(handlers::get_chart))
        .route("/chart", post(handlers::put_chart))
        .route("/reindex", post(handlers::reindex))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .with_state(AppState { backend });

    if settings.trace_requests {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(backend: Arc<dyn ChartBackend>, settings: ServerSettings) -> Result<()> {
    let app = router(backend, &settings);
    let listener = TcpListener::bind(settings.listen).await?;
    tracing::info!(addr = %listener.local_addr()?, "hrp listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("ctrl-c received, shutting down"),
        _ = terminate => tracing::warn!("SIGTERM received, shutting down"),
    }
}
