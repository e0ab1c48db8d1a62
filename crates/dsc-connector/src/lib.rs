//! # dsc-connector — Provider and Consumer Connectors
//!
//! The services that run the dataspace handshake on top of the state
//! machines in `dsc-state`:
//!
//! - [`store`]: injectable repositories with per-record locking.
//! - [`catalog`]: asset metadata and payloads.
//! - [`audit`]: fire-and-forget event sink.
//! - [`provider`]: the authoritative provider connector.
//! - [`peer`]: the consumer's view of a provider, with an in-process
//!   implementation.
//! - [`consumer`]: the consumer connector and its mirror saga.
//!
//! Nothing here does I/O beyond what a [`PeerConnector`] implementation
//! does; the HTTP client lives in `dsc-peer-client`.

pub mod audit;
pub mod catalog;
pub mod consumer;
pub mod error;
pub mod peer;
pub mod provider;
pub mod store;

pub use audit::{AuditEvent, AuditEventType, AuditLog, AuditSink, NullAudit, DEFAULT_AUDIT_CAPACITY};
pub use catalog::{preview, Asset, AssetCatalog, InMemoryCatalog, SAMPLE_PROVIDER_ID};
pub use consumer::{ConsumerConnector, ConsumerIdentity, IdentityOverride, Mirrored, SyncStatus};
pub use error::ConnectorError;
pub use peer::{
    CreateNegotiationRequest, CreateTransferRequest, FinalizeResponse, LocalPeer, OfferRequest,
    PeerConnector, PeerError, ReasonRequest,
};
pub use provider::{
    AssetPreview, ConnectorStatistics, Dataset, ProviderConnector, TransferData,
    TERMINATION_ACTOR,
};
pub use store::{try_update, MemoryStore, Record, Repository};
