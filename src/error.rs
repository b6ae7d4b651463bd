//! Typed errors for the push pipeline. Each variant knows the HTTP status the
//! gateway answers with: 403 for identity problems, 400 for unparsable
//! payloads, 502 when the downstream agent cannot be reached or rejects.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{header} not valid")]
    InvalidHeader { header: &'static str },

    #[error("missing required header {header}")]
    MissingHeader { header: &'static str },

    #[error("could not parse request - {0}")]
    MalformedBody(String),

    #[error("reading for sense id {sense_id} is not a scalar value")]
    UnsupportedValue { sense_id: String },

    #[error("no reading for sense id {sense_id} (attribute {attribute})")]
    MissingReading {
        attribute: String,
        sense_id: String,
    },

    #[error("wire field {attribute} is not present in the attribute mapping")]
    UnmappedAttribute { attribute: String },

    #[error("IoT Agent returned {status}: {body}")]
    AgentRejected { status: u16, body: String },

    #[error("could not deliver data to platform: {0}")]
    AgentUnreachable(#[from] reqwest::Error),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::InvalidHeader { .. } | BridgeError::MissingHeader { .. } => {
                StatusCode::FORBIDDEN
            }
            BridgeError::MalformedBody(_)
            | BridgeError::UnsupportedValue { .. }
            | BridgeError::MissingReading { .. }
            | BridgeError::UnmappedAttribute { .. } => StatusCode::BAD_REQUEST,
            BridgeError::AgentRejected { .. } | BridgeError::AgentUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(%status, "request rejected: {self}");
        (status, Json(json!({ "msg": self.to_string() }))).into_response()
    }
}
