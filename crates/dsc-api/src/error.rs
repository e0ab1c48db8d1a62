//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Connector errors keep their machine-readable code and HTTP status from
//! [`ConnectorError::code`] and [`ConnectorError::http_status`], so every
//! error kind maps to a distinct, stable response. Internal and upstream
//! messages are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dsc_connector::ConnectorError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NEGOTIATION_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Structured context: the policy trace for denials, current and
    /// expected state for rejected transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Request body could not be parsed or contains invalid values (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A policy document failed to parse (422).
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Resource not found outside the connector taxonomy (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Connector(err) => (
                StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.code(),
            ),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::InvalidPolicy(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_POLICY"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<Value> {
        let Self::Connector(err) = self else {
            return None;
        };
        match err {
            ConnectorError::PolicyDenied {
                negotiation_id,
                evaluation,
            } => Some(json!({
                "negotiation_id": negotiation_id,
                "evaluation": evaluation,
            })),
            ConnectorError::InvalidStateTransition {
                action,
                current,
                expected,
            } => Some(json!({
                "action": action,
                "current_state": current,
                "expected_state": expected,
            })),
            ConnectorError::AgreementNotActive {
                agreement_id,
                status,
            } => Some(json!({ "agreement_id": agreement_id, "status": status })),
            ConnectorError::DataNotReady { transfer_id, state } => {
                Some(json!({ "transfer_id": transfer_id, "state": state }))
            }
            ConnectorError::OperationInFlight { id, action } => {
                Some(json!({ "id": id, "pending_action": action }))
            }
            ConnectorError::PeerError {
                status: Some(status),
                ..
            } => Some(json!({ "upstream_status": status })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal/upstream error messages to clients.
        let message = match &self {
            Self::Internal(_) | Self::Connector(ConnectorError::Internal(_)) => {
                "An internal error occurred".to_string()
            }
            Self::Connector(ConnectorError::PeerError { .. }) => {
                "The provider returned an error".to_string()
            }
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) | Self::Connector(ConnectorError::Internal(_)) => {
                tracing::error!(error = %self, "internal server error")
            }
            Self::Connector(ConnectorError::PeerError { .. }) => {
                tracing::error!(error = %self, "provider call failed")
            }
            Self::Connector(ConnectorError::PeerUnreachable { .. }) => {
                tracing::warn!(error = %self, "provider unreachable")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<dsc_policy::PolicyError> for AppError {
    fn from(err: dsc_policy::PolicyError) -> Self {
        Self::InvalidPolicy(err.to_string())
    }
}

impl From<dsc_core::DscError> for AppError {
    fn from(err: dsc_core::DscError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsc_core::{AgreementId, NegotiationId};
    use dsc_state::AgreementStatus;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn connector_errors_keep_their_codes() {
        let err = AppError::from(ConnectorError::NegotiationNotFound(NegotiationId::new()));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::NOT_FOUND, "NEGOTIATION_NOT_FOUND")
        );

        let err = AppError::from(ConnectorError::AgreementNotActive {
            agreement_id: AgreementId::new(),
            status: AgreementStatus::Terminated,
        });
        assert_eq!(
            err.status_and_code(),
            (StatusCode::CONFLICT, "AGREEMENT_NOT_ACTIVE")
        );
    }

    #[test]
    fn bad_request_is_unprocessable() {
        let (status, code) = AppError::BadRequest("missing field".into()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[tokio::test]
    async fn transition_error_carries_states() {
        let (status, body) = body_json(AppError::from(ConnectorError::InvalidStateTransition {
            action: "agree negotiation".into(),
            current: "REQUESTED".into(),
            expected: "OFFERED".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
        assert_eq!(body["error"]["details"]["current_state"], "REQUESTED");
        assert_eq!(body["error"]["details"]["expected_state"], "OFFERED");
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let (status, body) = body_json(AppError::Internal("lock poisoned at x.rs:12".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn peer_error_hides_body_but_keeps_status() {
        let (status, body) = body_json(AppError::from(ConnectorError::PeerError {
            endpoint: "POST http://provider/v1/negotiations".into(),
            status: Some(409),
            message: "secret upstream detail".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "PEER_ERROR");
        assert_eq!(body["error"]["details"]["upstream_status"], 409);
        assert!(!body.to_string().contains("secret upstream detail"));
    }
}
