//! # Application State
//!
//! Configuration and shared state for the Axum application. A process runs
//! exactly one role: the provider owns the authoritative records, the
//! consumer mirrors them through a peer connection to a provider.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use dsc_connector::{
    AuditLog, ConsumerConnector, ConsumerIdentity, CreateNegotiationRequest, CreateTransferRequest,
    Dataset, FinalizeResponse, InMemoryCatalog, LocalPeer, OfferRequest, PeerConnector, PeerError,
    ProviderConnector, ReasonRequest, DEFAULT_AUDIT_CAPACITY, SAMPLE_PROVIDER_ID,
};
use dsc_core::{NegotiationId, ParticipantId, TransferId};
use dsc_peer_client::{PeerClient, PeerConfig, PeerConfigError};
use dsc_state::{Negotiation, Transfer};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

// -- Configuration ------------------------------------------------------------

/// Which side of the handshake this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Provider,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Consumer => "consumer",
        }
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provider" => Ok(Self::Provider),
            "consumer" => Ok(Self::Consumer),
            other => Err(ConfigError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DSC_ROLE must be \"provider\" or \"consumer\", got {0:?}")]
    InvalidRole(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error(transparent)]
    Peer(#[from] PeerConfigError),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    pub role: Role,
    /// Provider participant id. Ignored by the consumer, whose id comes
    /// from its identity.
    pub participant_id: ParticipantId,
    /// Directory holding asset payload files, if payloads are not embedded.
    pub data_dir: Option<PathBuf>,
    /// Maximum number of retained audit events.
    pub audit_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            role: Role::Provider,
            participant_id: ParticipantId::from_static(SAMPLE_PROVIDER_ID),
            data_dir: None,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PORT` (default: 8080)
    /// - `DSC_ROLE` (`provider` | `consumer`, default: `provider`)
    /// - `DSC_PARTICIPANT_ID` (default: the sample provider id)
    /// - `DSC_DATA_DIR` (optional)
    /// - `DSC_AUDIT_CAPACITY` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let role = match std::env::var("DSC_ROLE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.role,
        };
        let participant_id = match std::env::var("DSC_PARTICIPANT_ID") {
            Ok(raw) => ParticipantId::new(raw)
                .map_err(|e| ConfigError::InvalidValue("DSC_PARTICIPANT_ID", e.to_string()))?,
            Err(_) => defaults.participant_id,
        };
        Ok(Self {
            port: env_parse("PORT", defaults.port)?,
            role,
            participant_id,
            data_dir: std::env::var("DSC_DATA_DIR").ok().map(PathBuf::from),
            audit_capacity: env_parse("DSC_AUDIT_CAPACITY", defaults.audit_capacity)?,
        })
    }
}

fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var, raw)),
        Err(_) => Ok(default),
    }
}

/// Consumer identity from environment variables, falling back to the
/// default identity field by field.
///
/// Variables: `DSC_CONSUMER_ID`, `DSC_COMPANY_NAME`, `DSC_PARTNER_TYPE`,
/// `DSC_REGION`, `DSC_CERTIFICATIONS` (comma-separated), `DSC_PURPOSE`.
pub fn identity_from_env() -> Result<ConsumerIdentity, ConfigError> {
    let mut identity = ConsumerIdentity::default();
    if let Ok(raw) = std::env::var("DSC_CONSUMER_ID") {
        identity.consumer_id = ParticipantId::new(raw)
            .map_err(|e| ConfigError::InvalidValue("DSC_CONSUMER_ID", e.to_string()))?;
    }
    if let Ok(v) = std::env::var("DSC_COMPANY_NAME") {
        identity.company_name = v;
    }
    if let Ok(v) = std::env::var("DSC_PARTNER_TYPE") {
        identity.partner_type = v;
    }
    if let Ok(v) = std::env::var("DSC_REGION") {
        identity.region = v;
    }
    if let Ok(v) = std::env::var("DSC_CERTIFICATIONS") {
        identity.certifications = split_list(&v);
    }
    if let Ok(v) = std::env::var("DSC_PURPOSE") {
        identity.purpose = v;
    }
    Ok(identity)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// -- Consumer peer ------------------------------------------------------------

/// The consumer's connection to its provider: over HTTP in deployment,
/// in-process for tests and single-binary demos.
#[derive(Debug, Clone)]
pub enum ConsumerPeer {
    Http(PeerClient),
    Local(LocalPeer),
}

macro_rules! delegate {
    ($self:ident, $peer:ident => $call:expr) => {
        match $self {
            ConsumerPeer::Http($peer) => $call.await,
            ConsumerPeer::Local($peer) => $call.await,
        }
    };
}

impl PeerConnector for ConsumerPeer {
    fn endpoint(&self) -> String {
        match self {
            Self::Http(peer) => peer.endpoint(),
            Self::Local(peer) => peer.endpoint(),
        }
    }

    async fn catalog(&self) -> Result<Vec<Dataset>, PeerError> {
        delegate!(self, p => p.catalog())
    }

    async fn create_negotiation(
        &self,
        request: &CreateNegotiationRequest,
    ) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.create_negotiation(request))
    }

    async fn offer(&self, id: NegotiationId, request: &OfferRequest) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.offer(id, request))
    }

    async fn agree(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.agree(id))
    }

    async fn verify(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.verify(id))
    }

    async fn finalize(&self, id: NegotiationId) -> Result<FinalizeResponse, PeerError> {
        delegate!(self, p => p.finalize(id))
    }

    async fn terminate_negotiation(
        &self,
        id: NegotiationId,
        request: &ReasonRequest,
    ) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.terminate_negotiation(id, request))
    }

    async fn get_negotiation(&self, id: NegotiationId) -> Result<Negotiation, PeerError> {
        delegate!(self, p => p.get_negotiation(id))
    }

    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.create_transfer(request))
    }

    async fn start_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.start_transfer(id))
    }

    async fn complete_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.complete_transfer(id))
    }

    async fn suspend_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.suspend_transfer(id, request))
    }

    async fn terminate_transfer(
        &self,
        id: TransferId,
        request: &ReasonRequest,
    ) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.terminate_transfer(id, request))
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, PeerError> {
        delegate!(self, p => p.get_transfer(id))
    }
}

// -- Shared state -------------------------------------------------------------

/// State for provider routes.
#[derive(Debug, Clone)]
pub struct ProviderState {
    pub connector: Arc<ProviderConnector>,
    pub audit: Arc<AuditLog>,
}

/// State for consumer routes.
#[derive(Debug, Clone)]
pub struct ConsumerState {
    pub connector: Arc<ConsumerConnector<ConsumerPeer>>,
    pub audit: Arc<AuditLog>,
}

#[derive(Debug, Clone)]
pub enum RoleState {
    Provider(ProviderState),
    Consumer(ConsumerState),
}

/// Shared application state passed to the health and metrics routes.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub role: RoleState,
    /// Render handle of the installed Prometheus recorder, if any.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("role", &self.role)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// A provider over the sample catalog, reading payload files from
    /// `config.data_dir` when set.
    pub fn provider(config: AppConfig) -> Self {
        let mut catalog = InMemoryCatalog::sample();
        if let Some(dir) = &config.data_dir {
            catalog = catalog.with_data_dir(dir.clone());
        }
        let audit = Arc::new(AuditLog::new(config.audit_capacity));
        let connector = ProviderConnector::new(config.participant_id.clone(), Arc::new(catalog))
            .with_audit(audit.clone());
        Self::with_provider(config, Arc::new(connector), audit)
    }

    /// Wrap an existing provider connector.
    pub fn with_provider(
        config: AppConfig,
        connector: Arc<ProviderConnector>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            config: AppConfig {
                role: Role::Provider,
                ..config
            },
            role: RoleState::Provider(ProviderState { connector, audit }),
            metrics: None,
        }
    }

    /// A consumer talking to its provider through `peer`.
    pub fn consumer(config: AppConfig, identity: ConsumerIdentity, peer: ConsumerPeer) -> Self {
        let audit = Arc::new(AuditLog::new(config.audit_capacity));
        let connector = ConsumerConnector::new(identity, peer).with_audit(audit.clone());
        Self {
            config: AppConfig {
                role: Role::Consumer,
                ..config
            },
            role: RoleState::Consumer(ConsumerState {
                connector: Arc::new(connector),
                audit,
            }),
            metrics: None,
        }
    }

    /// A consumer over HTTP, configured from `DSC_PEER_URL` and
    /// `DSC_PEER_TIMEOUT_SECS`.
    pub fn consumer_from_env(config: AppConfig) -> Result<Self, ConfigError> {
        let peer = PeerClient::new(PeerConfig::from_env()?)?;
        Ok(Self::consumer(config, identity_from_env()?, ConsumerPeer::Http(peer)))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn role(&self) -> Role {
        match self.role {
            RoleState::Provider(_) => Role::Provider,
            RoleState::Consumer(_) => Role::Consumer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Provider".parse::<Role>().unwrap(), Role::Provider);
        assert_eq!(" consumer ".parse::<Role>().unwrap(), Role::Consumer);
        assert!(matches!(
            "broker".parse::<Role>(),
            Err(ConfigError::InvalidRole(_))
        ));
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list("TISAX, ISO27001,,"),
            vec!["TISAX".to_string(), "ISO27001".to_string()]
        );
    }

    #[test]
    fn env_parse_falls_back_and_rejects_garbage() {
        assert_eq!(env_parse("DSC_TEST_UNSET_PORT_41", 8080u16).unwrap(), 8080);
        std::env::set_var("DSC_TEST_BAD_PORT_41", "eighty");
        let result = env_parse("DSC_TEST_BAD_PORT_41", 8080u16);
        std::env::remove_var("DSC_TEST_BAD_PORT_41");
        assert!(matches!(result, Err(ConfigError::InvalidValue("DSC_TEST_BAD_PORT_41", _))));
    }

    #[test]
    fn consumer_state_forces_role() {
        let provider = Arc::new(ProviderConnector::sample());
        let state = AppState::consumer(
            AppConfig::default(),
            ConsumerIdentity::default(),
            ConsumerPeer::Local(LocalPeer::new(provider)),
        );
        assert_eq!(state.role(), Role::Consumer);
        assert_eq!(state.config.role, Role::Consumer);
    }
}
