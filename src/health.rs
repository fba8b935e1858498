use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Liveness routes
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Binds the health check server
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind the health check server to {}", addr))
}

/// Serves the health route until the process ends
pub async fn serve(listener: TcpListener) -> Result<()> {
    axum::serve(listener, router())
        .await
        .context("health check server stopped")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));
        addr
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let addr = spawn_server().await;

        let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.json::<Value>().await.unwrap();
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn other_routes_are_not_found() {
        let addr = spawn_server().await;

        let resp = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(resp.status(), 404);
        let resp = reqwest::Client::new()
            .post(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 405);
    }
}
