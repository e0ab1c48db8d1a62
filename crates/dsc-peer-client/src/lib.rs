//! # dsc-peer-client — HTTP Peer Connector
//!
//! [`PeerClient`] implements [`PeerConnector`] against a provider's HTTP
//! API. Every call is a single attempt bounded by the configured timeout;
//! there is no retry and no backoff. Failures map onto [`PeerError`]:
//!
//! | Failure                                   | Variant                 |
//! |-------------------------------------------|-------------------------|
//! | connect refused, DNS, timeout, body read  | `PeerError::Unreachable`|
//! | non-2xx response                          | `PeerError::Status`     |
//! | 2xx with a body that does not decode      | `PeerError::Decode`     |
//!
//! ## Routes
//!
//! | Method | Path                                 | Call                     |
//! |--------|--------------------------------------|--------------------------|
//! | GET    | `/v1/catalog`                        | `catalog`                |
//! | POST   | `/v1/negotiations`                   | `create_negotiation`     |
//! | POST   | `/v1/negotiations/{id}/offer`        | `offer`                  |
//! | POST   | `/v1/negotiations/{id}/agree`        | `agree`                  |
//! | POST   | `/v1/negotiations/{id}/verify`       | `verify`                 |
//! | POST   | `/v1/negotiations/{id}/finalize`     | `finalize`               |
//! | POST   | `/v1/negotiations/{id}/terminate`    | `terminate_negotiation`  |
//! | GET    | `/v1/negotiations/{id}`              | `get_negotiation`        |
//! | POST   | `/v1/transfers`                      | `create_transfer`        |
//! | POST   | `/v1/transfers/{id}/start`           | `start_transfer`         |
//! | POST   | `/v1/transfers/{id}/complete`        | `complete_transfer`      |
//! | POST   | `/v1/transfers/{id}/suspend`         | `suspend_transfer`       |
//! | POST   | `/v1/transfers/{id}/terminate`       | `terminate_transfer`     |
//! | GET    | `/v1/transfers/{id}`                 | `get_transfer`           |

pub mod config;

pub use config::{PeerConfig, PeerConfigError};

use std::time::Duration;

use dsc_connector::{
    CreateNegotiationRequest, CreateTransferRequest, Dataset, FinalizeResponse, OfferRequest,
    PeerConnector, PeerError, ReasonRequest,
};
use dsc_core::{NegotiationId, TransferId};
use dsc_state::{Negotiation, Transfer};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client for one provider.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PeerClient {
    /// Build a client from configuration.
    pub fn new(config: PeerConfig) -> Result<Self, PeerConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| PeerConfigError::Client(e.to_string()))?;

        let base_url = config.base_url.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PeerError> {
        let url = self.url(path);
        let endpoint = format!("GET {url}");
        self.send(self.http.get(&url), endpoint).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, PeerError> {
        let url = self.url(path);
        let endpoint = format!("POST {url}");
        let request = match body {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.post(&url),
        };
        self.send(request, endpoint).await
    }

    /// Send once and decode a 2xx JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: String,
    ) -> Result<T, PeerError> {
        let resp = request.send().await.map_err(|e| self.unreachable(&endpoint, e))?;

        let status = resp.status();
        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), "peer responded");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PeerError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.unreachable(&endpoint, e))?;
        serde_json::from_slice(&bytes).map_err(|e| PeerError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    fn unreachable(&self, endpoint: &str, err: reqwest::Error) -> PeerError {
        let message = if err.is_timeout() {
            format!("timed out after {}s", self.timeout.as_secs())
        } else {
            err.to_string()
        };
        PeerError::Unreachable {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}

impl PeerConnector for PeerClient {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    async fn catalog(&self) -> Result<Vec<Dataset>, PeerError> {
        self.get("/v1/catalog").await
    }

    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<Negotiation, PeerError> {
        self.post("/v1/negotiations", Some(request)).await
    }

    async fn offer(&self, id: NegotiationId, request: &OfferRequest) -> Result<Negotiation, PeerError> {
        self.post(&format!("/v1/negotiations/{}/offer", id.0), Some(request))
            .await
    }

    async fn agree(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.post::<(), _>(&format!("/v1/negotiations/{}/agree", id.0), None)
            .await
    }

    async fn verify(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.post::<(), _>(&format!("/v1/negotiations/{}/verify", id.0), None)
            .await
    }

    async fn finalize(&self, id: NegotiationId) -> Result<FinalizeResponse, PeerError> {
        self.post::<(), _>(&format!("/v1/negotiations/{}/finalize", id.0), None)
            .await
    }

    async fn terminate_negotiation(
        &self,
        id: NegotiationId,
        request: &ReasonRequest,
    ) -> Result<Negotiation, PeerError> {
        self.post(&format!("/v1/negotiations/{}/terminate", id.0), Some(request))
            .await
    }

    async fn get_negotiation(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        self.get(&format!("/v1/negotiations/{}", id.0)).await
    }

    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, PeerError> {
        self.post("/v1/transfers", Some(request)).await
    }

    async fn start_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.post::<(), _>(&format!("/v1/transfers/{}/start", id.0), None)
            .await
    }

    async fn complete_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.post::<(), _>(&format!("/v1/transfers/{}/complete", id.0), None)
            .await
    }

    async fn suspend_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        self.post(&format!("/v1/transfers/{}/suspend", id.0), Some(request))
            .await
    }

    async fn terminate_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        self.post(&format!("/v1/transfers/{}/terminate", id.0), Some(request))
            .await
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        self.get(&format!("/v1/transfers/{}", id.0)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = PeerClient::new(PeerConfig::new("http://127.0.0.1:9000/").unwrap()).unwrap();
        assert_eq!(client.url("/v1/catalog"), "http://127.0.0.1:9000/v1/catalog");
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let client =
            PeerClient::new(PeerConfig::new("http://gateway.local/provider-a").unwrap()).unwrap();
        assert_eq!(
            client.url("/v1/catalog"),
            "http://gateway.local/provider-a/v1/catalog"
        );
        assert_eq!(client.endpoint(), "http://gateway.local/provider-a");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let config = PeerConfig::new("http://127.0.0.1:1").unwrap().with_timeout_secs(1);
        let client = PeerClient::new(config).unwrap();
        let err = client.catalog().await.unwrap_err();
        assert!(matches!(err, PeerError::Unreachable { .. }), "got {err:?}");
    }
}
