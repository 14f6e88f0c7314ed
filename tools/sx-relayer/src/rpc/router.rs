use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::handlers::{handle_health, handle_rpc};
use super::RpcState;

pub fn build_router(state: Arc<RpcState>, body_limit: usize) -> Router {
    Router::new()
        .route("/rpc/:chain_id", post(handle_rpc))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn run_json_rpc_server(
    listener: TcpListener,
    state: Arc<RpcState>,
    body_limit: usize,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(?addr, "json-rpc server accepting connections");
    axum::serve(listener, build_router(state, body_limit)).with_graceful_shutdown(shutdown).await
}
