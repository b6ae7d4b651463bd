//! `POST /ts280/thingsee/` — validate the pushing gateway's identity, re-map
//! the readings, and forward one UL2.0 payload downstream.

use super::AppState;
use crate::config::SensorConfig;
use crate::error::BridgeError;
use crate::mapping::{self, PushMessage};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

/// The headers the original gateway treats as relevant. `Connectorid` is
/// logged but never validated.
#[derive(Debug, Default)]
pub struct RelevantHeaders {
    pub user_agent: Option<String>,
    pub connector_name: Option<String>,
    pub connector_id: Option<String>,
    pub device_auth_uuid: Option<String>,
}

pub fn extract_headers(headers: &HeaderMap) -> RelevantHeaders {
    let value = |name: &str| -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    RelevantHeaders {
        user_agent: value("user-agent"),
        connector_name: value("connectorname"),
        connector_id: value("connectorid"),
        device_auth_uuid: value("deviceauthuuid"),
    }
}

fn check(
    header: &'static str,
    actual: Option<&str>,
    expected: &str,
) -> Result<(), BridgeError> {
    match actual {
        None => Err(BridgeError::MissingHeader { header }),
        Some(v) if v != expected => Err(BridgeError::InvalidHeader { header }),
        Some(_) => Ok(()),
    }
}

/// Validate the three identity headers against the configured constants.
pub fn validate_headers(
    headers: &RelevantHeaders,
    cfg: &SensorConfig,
) -> Result<(), BridgeError> {
    check("User-Agent", headers.user_agent.as_deref(), &cfg.user_agent)?;
    check(
        "Connectorname",
        headers.connector_name.as_deref(),
        &cfg.connector_name,
    )?;
    check(
        "Deviceauthuuid",
        headers.device_auth_uuid.as_deref(),
        &cfg.device_id,
    )?;
    Ok(())
}

pub async fn handle_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Vec<PushMessage>>, JsonRejection>,
) -> Result<Json<serde_json::Value>, BridgeError> {
    // Body parse failures answer 400 before identity is checked, matching
    // the original route's phase order.
    let Json(messages) = body.map_err(|e| BridgeError::MalformedBody(e.body_text()))?;

    let relevant = extract_headers(&headers);
    if let Some(connector_id) = &relevant.connector_id {
        tracing::debug!(%connector_id, "push received");
    }
    validate_headers(&relevant, &state.config.sensor)?;

    let payload = mapping::map_push_body(
        &messages,
        &state.config.sensor.attribute_mapping,
        &state.config.sensor.wire_order,
    )?;

    tracing::info!(payload = %payload, "forwarding push");
    state.agent.send(&payload).await?;

    Ok(Json(json!({})))
}
