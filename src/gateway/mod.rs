//! Push-bridge gateway: the axum server that accepts TS280 push
//! notifications on `/ts280/thingsee/` and a status probe on `/`.

pub mod push;

use crate::agent::{DeviceRoute, IotAgentClient};
use crate::config::BridgeConfig;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Push bodies are tiny; anything past this is not a sensor push.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub agent: Arc<IotAgentClient>,
}

impl AppState {
    pub fn new(config: Arc<BridgeConfig>) -> anyhow::Result<Self> {
        let agent = IotAgentClient::new(&DeviceRoute::for_push(&config))?;
        Ok(Self {
            config,
            agent: Arc::new(agent),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_status))
        .route("/ts280/thingsee/", post(push::handle_push))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Run the gateway until ctrl-c.
pub async fn serve(config: BridgeConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server.bind address {}: {e}", config.server.bind))?;

    let state = AppState::new(Arc::new(config))?;
    tracing::info!(%addr, endpoint = state.agent.endpoint(), "push bridge listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {e}");
        return;
    }
    tracing::info!("shutdown requested");
}

/// GET / — liveness probe with a current timestamp.
async fn handle_status() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn status_probe_reports_ok() {
        let mut cfg = BridgeConfig::default();
        cfg.agent.base_url = "http://127.0.0.1:1".to_string();
        let state = AppState::new(Arc::new(cfg)).unwrap();

        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "OK");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let mut cfg = BridgeConfig::default();
        cfg.agent.base_url = "http://127.0.0.1:1".to_string();
        let state = AppState::new(Arc::new(cfg)).unwrap();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
