use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::config::ServerConfig;

pub fn router() -> Router {
    Router::new().route("/", get(index)).route("/health", get(health))
}

async fn index() -> impl IntoResponse {
    (StatusCode::OK, Json("Hello World"))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Serves until ctrl-c is received.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!("server listening on {}", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for shutdown signal: {}", e);
        return;
    }
    info!("shutdown signal received");
}
