//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use docconv_core::ToolchainApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub api: Arc<ToolchainApi>,
}

/// Build the router serving `/health` and `/rpc`.
pub fn router(api: Arc<ToolchainApi>) -> Router {
    let state = Arc::new(AppState { api });

    // The shell loads its UI from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    api: Arc<ToolchainApi>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(api);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_starts() {
        let temp_dir = TempDir::new().unwrap();
        let api = ToolchainApi::builder(temp_dir.path())
            .system_dirs(vec![])
            .build()
            .await
            .unwrap();

        let addr = start_server(Arc::new(api), "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);
    }
}
