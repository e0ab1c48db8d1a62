//! # Connector Error Taxonomy
//!
//! Every failure a connector operation can surface. All of them are
//! returned immediately with structured fields; none is retried. Errors
//! raised by a guard never mutate the entity they were raised for.

use dsc_core::{AgreementId, AssetId, NegotiationId, PolicyKey, TransferId};
use dsc_policy::PolicyDecision;
use dsc_state::{AgreementError, AgreementStatus, NegotiationError, TransferError, TransferState};
use thiserror::Error;

use crate::peer::PeerError as PeerCallError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    #[error("{0} not found")]
    NegotiationNotFound(NegotiationId),

    #[error("{0} not found")]
    AgreementNotFound(AgreementId),

    #[error("{0} not found")]
    TransferNotFound(TransferId),

    #[error("asset {0} not found")]
    AssetNotFound(AssetId),

    /// An asset is bound to a policy key the registry does not know.
    #[error("policy {0} not found")]
    PolicyNotFound(PolicyKey),

    /// A guard rejected the transition.
    #[error("cannot {action} in state {current}; expected {expected}")]
    InvalidStateTransition {
        action: String,
        current: String,
        expected: String,
    },

    /// The provider's policy refused the consumer.
    #[error("{negotiation_id} denied by policy: {}", .evaluation.reason)]
    PolicyDenied {
        negotiation_id: NegotiationId,
        evaluation: PolicyDecision,
    },

    #[error("{agreement_id} is not active (status {status})")]
    AgreementNotActive {
        agreement_id: AgreementId,
        status: AgreementStatus,
    },

    /// The catalog has no payload for the asset.
    #[error("no data available for asset {asset_id}")]
    DataUnavailable { asset_id: AssetId },

    /// Data was requested from a transfer that has not completed.
    #[error("{transfer_id} has no data yet (state {state})")]
    DataNotReady {
        transfer_id: TransferId,
        state: TransferState,
    },

    /// A mirrored transition is already waiting on the peer.
    #[error("{id} already has a pending {action} call to the peer")]
    OperationInFlight { id: String, action: String },

    #[error("peer unreachable at {endpoint}: {message}")]
    PeerUnreachable { endpoint: String, message: String },

    /// The peer answered, but not with a usable success response.
    #[error("peer error at {endpoint}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    PeerError {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Machine-readable code carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NegotiationNotFound(_) => "NEGOTIATION_NOT_FOUND",
            Self::AgreementNotFound(_) => "AGREEMENT_NOT_FOUND",
            Self::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            Self::AssetNotFound(_) => "ASSET_NOT_FOUND",
            Self::PolicyNotFound(_) => "POLICY_NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::PolicyDenied { .. } => "POLICY_DENIED",
            Self::AgreementNotActive { .. } => "AGREEMENT_NOT_ACTIVE",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::DataNotReady { .. } => "DATA_NOT_READY",
            Self::OperationInFlight { .. } => "OPERATION_IN_FLIGHT",
            Self::PeerUnreachable { .. } => "PEER_UNREACHABLE",
            Self::PeerError { .. } => "PEER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the error is reported with, by the API and by
    /// in-process peers alike.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NegotiationNotFound(_)
            | Self::AgreementNotFound(_)
            | Self::TransferNotFound(_)
            | Self::AssetNotFound(_)
            | Self::PolicyNotFound(_) => 404,
            Self::InvalidStateTransition { .. }
            | Self::AgreementNotActive { .. }
            | Self::DataNotReady { .. }
            | Self::OperationInFlight { .. } => 409,
            Self::PolicyDenied { .. } => 403,
            Self::DataUnavailable { .. } | Self::PeerUnreachable { .. } => 503,
            Self::PeerError { .. } => 502,
            Self::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == 404
    }
}

impl From<NegotiationError> for ConnectorError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::InvalidTransition {
                action,
                current,
                expected,
            } => Self::InvalidStateTransition {
                action: format!("{action} negotiation"),
                current: current.to_string(),
                expected,
            },
        }
    }
}

impl From<TransferError> for ConnectorError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidTransition {
                action,
                current,
                expected,
            } => Self::InvalidStateTransition {
                action: format!("{action} transfer"),
                current: current.to_string(),
                expected,
            },
            TransferError::AgreementNotActive {
                agreement_id,
                status,
            } => Self::AgreementNotActive {
                agreement_id,
                status,
            },
        }
    }
}

impl From<AgreementError> for ConnectorError {
    fn from(err: AgreementError) -> Self {
        match err {
            AgreementError::AlreadyTerminated { .. } => Self::InvalidStateTransition {
                action: "terminate agreement".to_string(),
                current: AgreementStatus::Terminated.to_string(),
                expected: AgreementStatus::Active.to_string(),
            },
        }
    }
}

impl From<PeerCallError> for ConnectorError {
    fn from(err: PeerCallError) -> Self {
        match err {
            PeerCallError::Unreachable { endpoint, message } => {
                Self::PeerUnreachable { endpoint, message }
            }
            PeerCallError::Status {
                endpoint,
                status,
                body,
            } => Self::PeerError {
                endpoint,
                status: Some(status),
                message: body,
            },
            PeerCallError::Decode { endpoint, message } => Self::PeerError {
                endpoint,
                status: None,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsc_state::{NegotiationAction, NegotiationState};

    #[test]
    fn test_negotiation_guard_maps_to_invalid_state_transition() {
        let err: ConnectorError = NegotiationError::InvalidTransition {
            action: NegotiationAction::Agree,
            current: NegotiationState::Requested,
            expected: "OFFERED".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "cannot agree negotiation in state REQUESTED; expected OFFERED"
        );
    }

    #[test]
    fn test_status_and_code() {
        let err = ConnectorError::OperationInFlight {
            id: "negotiation:x".into(),
            action: "agree".into(),
        };
        assert_eq!(err.http_status(), 409);
        assert_eq!(err.code(), "OPERATION_IN_FLIGHT");
        assert!(ConnectorError::AssetNotFound(AssetId::from_static("a")).is_not_found());
        assert_eq!(ConnectorError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn test_peer_status_message_includes_code() {
        let err: ConnectorError = PeerCallError::Status {
            endpoint: "POST /v1/negotiations".into(),
            status: 409,
            body: "conflict".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "peer error at POST /v1/negotiations (HTTP 409): conflict"
        );
    }
}
