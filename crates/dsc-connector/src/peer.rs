//! # Peer Connector Interface
//!
//! The consumer talks to the provider through [`PeerConnector`]: one typed
//! call per mirrored transition plus snapshot reads. Implementations make a
//! single attempt with a fixed timeout and report failures as
//! [`PeerError`]; retrying is the caller's decision.
//!
//! The request and response bodies defined here are the provider's wire
//! format, shared by the HTTP routes and the HTTP client.
//!
//! [`LocalPeer`] runs the provider in-process. It goes through the same
//! error mapping a remote provider would, which keeps the consumer saga
//! honest in tests and in the CLI demo.

use std::future::Future;
use std::sync::Arc;

use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, TransferId};
use dsc_policy::EvaluationContext;
use dsc_state::{Agreement, Negotiation, Transfer, TransferOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{Dataset, ProviderConnector};

// ─── Wire types ──────────────────────────────────────────────────────

/// Body of `POST /v1/negotiations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNegotiationRequest {
    pub consumer_id: ParticipantId,
    pub asset_id: AssetId,
    #[serde(default)]
    pub consumer_attributes: EvaluationContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_address: Option<String>,
}

/// Body of `POST /v1/negotiations/{id}/offer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferRequest {
    /// Replaces the attributes stored on the negotiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_attributes: Option<EvaluationContext>,
}

/// Body of the terminate and suspend endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body of `POST /v1/transfers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub agreement_id: AgreementId,
    #[serde(flatten)]
    pub options: TransferOptions,
}

/// Response of `POST /v1/negotiations/{id}/finalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub negotiation: Negotiation,
    pub agreement: Agreement,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Failure of a single peer call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeerError {
    /// Connection refused, DNS failure, or timeout.
    #[error("{endpoint} unreachable: {message}")]
    Unreachable { endpoint: String, message: String },

    /// The peer answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The peer answered 2xx but the body did not decode.
    #[error("{endpoint} returned an undecodable body: {message}")]
    Decode { endpoint: String, message: String },
}

// ─── Trait ───────────────────────────────────────────────────────────

/// Provider operations as seen from the consumer.
pub trait PeerConnector: Send + Sync {
    /// Where calls go, for logs and error messages.
    fn endpoint(&self) -> String;

    /// The provider's published datasets.
    fn catalog(&self) -> impl Future<Output = Result<Vec<Dataset>, PeerError>> + Send;

    fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn offer(
        &self,
        id: NegotiationId,
        request: &OfferRequest,
    ) -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn agree(&self, id: NegotiationId) -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn verify(&self, id: NegotiationId)
        -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn finalize(
        &self,
        id: NegotiationId,
    ) -> impl Future<Output = Result<FinalizeResponse, PeerError>> + Send;

    fn terminate_negotiation(
        &self,
        id: NegotiationId,
        request: &ReasonRequest,
    ) -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn get_negotiation(
        &self,
        id: NegotiationId,
    ) -> impl Future<Output = Result<Negotiation, PeerError>> + Send;

    fn create_transfer(
        &self,
        request: &CreateTransferRequest,
    ) -> impl Future<Output = Result<Transfer, PeerError>> + Send;

    fn start_transfer(
        &self,
        id: TransferId,
    ) -> impl Future<Output = Result<Transfer, PeerError>> + Send;

    fn complete_transfer(
        &self,
        id: TransferId,
    ) -> impl Future<Output = Result<Transfer, PeerError>> + Send;

    fn suspend_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> impl Future<Output = Result<Transfer, PeerError>> + Send;

    fn terminate_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> impl Future<Output = Result<Transfer, PeerError>> + Send;

    fn get_transfer(&self, id: TransferId)
        -> impl Future<Output = Result<Transfer, PeerError>> + Send;
}

// ─── In-process peer ─────────────────────────────────────────────────

const LOCAL_ENDPOINT: &str = "local";

/// A provider running in the same process.
#[derive(Debug, Clone)]
pub struct LocalPeer {
    provider: Arc<ProviderConnector>,
}

impl LocalPeer {
    pub fn new(provider: Arc<ProviderConnector>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<ProviderConnector> {
        &self.provider
    }

    fn call<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&ProviderConnector) -> Result<T, crate::ConnectorError>,
    ) -> Result<T, PeerError> {
        f(&self.provider).map_err(|err| PeerError::Status {
            endpoint: format!("{LOCAL_ENDPOINT} {operation}"),
            status: err.http_status(),
            body: err.to_string(),
        })
    }
}

impl PeerConnector for LocalPeer {
    fn endpoint(&self) -> String {
        LOCAL_ENDPOINT.to_string()
    }

    async fn catalog(&self) -> Result<Vec<Dataset>, PeerError> {
        self.call("catalog", |p| p.catalog())
    }

    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<Negotiation, PeerError> {
        self.call("create_negotiation", |p| p.create_negotiation(request.clone()))
    }

    async fn offer(&self, id: NegotiationId, request: &OfferRequest) -> Result<Negotiation, PeerError> {
        self.call("offer", |p| p.offer(id, request.consumer_attributes.clone()))
    }

    async fn agree(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.call("agree", |p| p.agree(id))
    }

    async fn verify(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.call("verify", |p| p.verify(id))
    }

    async fn finalize(&self, id: NegotiationId) -> Result<FinalizeResponse, PeerError> {
        self.call("finalize", |p| {
            p.finalize(id)
                .map(|(negotiation, agreement)| FinalizeResponse {
                    negotiation,
                    agreement,
                })
        })
    }

    async fn terminate_negotiation(
        &self,
        id: NegotiationId,
        request: &ReasonRequest,
    ) -> Result<Negotiation, PeerError> {
        self.call("terminate_negotiation", |p| {
            p.terminate_negotiation(id, request.reason.clone())
        })
    }

    async fn get_negotiation(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.call("get_negotiation", |p| p.negotiation(id))
    }

    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, PeerError> {
        self.call("create_transfer", |p| {
            p.create_transfer(request.agreement_id, request.options.clone())
        })
    }

    async fn start_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.call("start_transfer", |p| p.start_transfer(id))
    }

    async fn complete_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.call("complete_transfer", |p| p.complete_transfer(id))
    }

    async fn suspend_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        self.call("suspend_transfer", |p| p.suspend_transfer(id, request.reason.clone()))
    }

    async fn terminate_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        self.call("terminate_transfer", |p| {
            p.terminate_transfer(id, request.reason.clone())
        })
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.call("get_transfer", |p| p.transfer(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_transfer_request_flattens_options() {
        let request = CreateTransferRequest {
            agreement_id: AgreementId::new(),
            options: TransferOptions {
                data_destination: Some("s3://bucket/inbox".into()),
                format: None,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["data_destination"], "s3://bucket/inbox");
        assert!(value.get("options").is_none());
    }

    #[test]
    fn test_offer_request_accepts_empty_body() {
        let request: OfferRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.consumer_attributes.is_none());
    }

    #[test]
    fn test_create_negotiation_rejects_empty_asset_id() {
        let result: Result<CreateNegotiationRequest, _> = serde_json::from_value(json!({
            "consumer_id": "consumer-a",
            "asset_id": ""
        }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_local_peer_maps_provider_errors_to_status() {
        let peer = LocalPeer::new(Arc::new(ProviderConnector::sample()));
        let err = peer.agree(NegotiationId::new()).await.unwrap_err();
        match err {
            PeerError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }
}
