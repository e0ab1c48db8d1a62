//! # Consumer Connector
//!
//! The consumer keeps a local mirror of every negotiation and transfer it
//! runs against a provider. The provider is authoritative; the mirror only
//! ever holds snapshots the provider returned.
//!
//! ## Mirror saga
//!
//! Each mirrored transition runs in two phases:
//!
//! 1. Under the record's entry lock, mark it [`SyncStatus::Pending`]. A
//!    second caller on the same id gets `OperationInFlight`. When the
//!    mirror is confirmed, the local state is checked against the action
//!    first and an impossible transition fails without a peer call.
//! 2. Call the peer with no lock held. On success the returned snapshot is
//!    committed as [`SyncStatus::Confirmed`]. On failure the mirrored state
//!    is left as it was and the record is marked
//!    [`SyncStatus::Unconfirmed`] with the error.
//!
//! There is no automatic retry. An unconfirmed record is reconciled with
//! [`ConsumerConnector::refresh_negotiation`] or
//! [`ConsumerConnector::refresh_transfer`]. A call whose future is dropped
//! before the peer answers leaves the record unconfirmed as well.

use std::future::Future;
use std::sync::Arc;

use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, Timestamp, TransferId};
use dsc_policy::EvaluationContext;
use dsc_state::{
    Agreement, Negotiation, NegotiationAction, NegotiationState, Transfer, TransferAction,
    TransferOptions, TransferState,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEventType, AuditSink, NullAudit};
use crate::error::ConnectorError;
use crate::peer::{
    CreateNegotiationRequest, CreateTransferRequest, OfferRequest, PeerConnector, PeerError,
    ReasonRequest,
};
use crate::provider::Dataset;
use crate::store::{try_update, MemoryStore, Record, Repository};

// ─── Identity ────────────────────────────────────────────────────────

/// Attributes the consumer presents to providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerIdentity {
    pub consumer_id: ParticipantId,
    pub company_name: String,
    pub partner_type: String,
    pub region: String,
    pub certifications: Vec<String>,
    pub purpose: String,
}

impl Default for ConsumerIdentity {
    fn default() -> Self {
        Self {
            consumer_id: ParticipantId::from_static("consumer-tierone-supplier"),
            company_name: "TierOne Electronics GmbH".to_string(),
            partner_type: "tier1_supplier".to_string(),
            region: "EU".to_string(),
            certifications: vec![
                "TISAX".to_string(),
                "ISO27001".to_string(),
                "IATF16949".to_string(),
            ],
            purpose: "quality_analysis".to_string(),
        }
    }
}

impl ConsumerIdentity {
    /// The evaluation context sent with a negotiation.
    pub fn attributes(&self) -> EvaluationContext {
        EvaluationContext::new()
            .with("partner_type", self.partner_type.as_str())
            .with("region", self.region.as_str())
            .with("certification", self.certifications.clone())
            .with("purpose", self.purpose.as_str())
    }

    /// This identity with the override's fields applied.
    pub fn overridden(&self, with: &IdentityOverride) -> Self {
        let mut identity = self.clone();
        if let Some(partner_type) = &with.partner_type {
            identity.partner_type = partner_type.clone();
        }
        if let Some(region) = &with.region {
            identity.region = region.clone();
        }
        if let Some(certifications) = &with.certifications {
            identity.certifications = certifications.clone();
        }
        if let Some(purpose) = &with.purpose {
            identity.purpose = purpose.clone();
        }
        identity
    }
}

/// Per-offer identity changes; unset fields keep the stored identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityOverride {
    #[serde(default)]
    pub partner_type: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub certifications: Option<Vec<String>>,
    #[serde(default)]
    pub purpose: Option<String>,
}

// ─── Mirror records ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// A peer call is in flight.
    Pending,
    /// The mirror matches the provider's last answer.
    Confirmed,
    /// The last peer call failed; the provider may have moved on.
    Unconfirmed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Unconfirmed => "UNCONFIRMED",
        })
    }
}

/// A provider snapshot plus its synchronization status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mirrored<T> {
    #[serde(flatten)]
    pub record: T,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub synced_at: Timestamp,
}

impl<T> Mirrored<T> {
    fn confirmed(record: T) -> Self {
        Self {
            record,
            sync_status: SyncStatus::Confirmed,
            pending_action: None,
            last_error: None,
            synced_at: Timestamp::now(),
        }
    }

    fn confirm(&mut self, record: T) {
        self.record = record;
        self.sync_status = SyncStatus::Confirmed;
        self.pending_action = None;
        self.last_error = None;
        self.synced_at = Timestamp::now();
    }

    fn mark_unconfirmed(&mut self, error: String) {
        self.sync_status = SyncStatus::Unconfirmed;
        self.pending_action = None;
        self.last_error = Some(error);
    }
}

impl<T: Record> Record for Mirrored<T> {
    type Id = T::Id;

    fn record_id(&self) -> T::Id {
        self.record.record_id()
    }
}

/// Entities the consumer mirrors.
pub trait Mirrorable: Record {
    fn not_found(id: &Self::Id) -> ConnectorError;
}

impl Mirrorable for Negotiation {
    fn not_found(id: &NegotiationId) -> ConnectorError {
        ConnectorError::NegotiationNotFound(*id)
    }
}

impl Mirrorable for Transfer {
    fn not_found(id: &TransferId) -> ConnectorError {
        ConnectorError::TransferNotFound(*id)
    }
}

/// Marks the record unconfirmed if the peer call never settles.
struct InFlight<'a, T: Record> {
    repo: &'a dyn Repository<Mirrored<T>>,
    id: T::Id,
    armed: bool,
}

impl<T: Record> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(id = %self.id, "peer call abandoned before completion");
        self.repo.update(
            &self.id,
            Box::new(|m: &mut Mirrored<T>| {
                if m.sync_status == SyncStatus::Pending {
                    m.mark_unconfirmed("peer call abandoned before completion".to_string());
                }
                Ok(())
            }),
        );
    }
}

// ─── Connector ───────────────────────────────────────────────────────

/// Consumer-side connector talking to one provider through `P`.
pub struct ConsumerConnector<P> {
    identity: RwLock<ConsumerIdentity>,
    peer: P,
    negotiations: Arc<dyn Repository<Mirrored<Negotiation>>>,
    agreements: Arc<dyn Repository<Agreement>>,
    transfers: Arc<dyn Repository<Mirrored<Transfer>>>,
    cached_catalog: RwLock<Option<Vec<Dataset>>>,
    audit: Arc<dyn AuditSink>,
}

impl<P> std::fmt::Debug for ConsumerConnector<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerConnector")
            .field("consumer_id", &self.identity.read().consumer_id)
            .field("negotiations", &self.negotiations.len())
            .field("agreements", &self.agreements.len())
            .field("transfers", &self.transfers.len())
            .finish()
    }
}

impl<P: PeerConnector> ConsumerConnector<P> {
    pub fn new(identity: ConsumerIdentity, peer: P) -> Self {
        Self {
            identity: RwLock::new(identity),
            peer,
            negotiations: Arc::new(MemoryStore::new()),
            agreements: Arc::new(MemoryStore::new()),
            transfers: Arc::new(MemoryStore::new()),
            cached_catalog: RwLock::new(None),
            audit: Arc::new(NullAudit),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn identity(&self) -> ConsumerIdentity {
        self.identity.read().clone()
    }

    /// Apply `with` to the stored identity. The consumer id never changes.
    /// Affects negotiations initiated or offered from now on.
    pub fn update_identity(&self, with: &IdentityOverride) -> ConsumerIdentity {
        let updated = {
            let mut identity = self.identity.write();
            *identity = identity.overridden(with);
            identity.clone()
        };
        tracing::info!(consumer = %updated.consumer_id, "consumer identity updated");
        self.audit.record(
            AuditEventType::IdentityUpdated,
            json!({
                "partner_type": updated.partner_type,
                "region": updated.region,
                "certifications": updated.certifications,
                "purpose": updated.purpose,
            }),
        );
        updated
    }

    /// Drop every mirrored record, agreement, and the cached catalog.
    pub fn reset(&self) {
        self.negotiations.clear();
        self.agreements.clear();
        self.transfers.clear();
        *self.cached_catalog.write() = None;
        tracing::info!("consumer state reset");
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    // ── Catalog ──────────────────────────────────────────────────────

    /// Fetch the provider's catalog and cache it.
    pub async fn browse_catalog(&self) -> Result<Vec<Dataset>, ConnectorError> {
        let datasets = self.peer_call("catalog", self.peer.catalog()).await?;
        *self.cached_catalog.write() = Some(datasets.clone());
        Ok(datasets)
    }

    /// The catalog as last fetched, if any.
    pub fn cached_catalog(&self) -> Option<Vec<Dataset>> {
        self.cached_catalog.read().clone()
    }

    // ── Negotiations ─────────────────────────────────────────────────

    /// Ask the provider to open a negotiation, presenting this consumer's
    /// identity. Nothing is stored locally unless the provider accepts.
    pub async fn initiate_negotiation(
        &self,
        asset_id: AssetId,
    ) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let identity = self.identity();
        let consumer_attributes = identity.attributes();
        let request = CreateNegotiationRequest {
            consumer_id: identity.consumer_id,
            asset_id,
            consumer_attributes,
            callback_address: None,
        };
        let negotiation = self
            .peer_call("create_negotiation", self.peer.create_negotiation(&request))
            .await?;

        let mirror = Mirrored::confirmed(negotiation);
        self.negotiations.put(mirror.clone());
        tracing::info!(
            negotiation = %mirror.record.id,
            asset = %mirror.record.asset_id,
            "negotiation initiated"
        );
        self.audit.record(
            AuditEventType::NegotiationInitiated,
            json!({
                "negotiation_id": mirror.record.id,
                "asset_id": mirror.record.asset_id,
            }),
        );
        Ok(mirror)
    }

    /// Ask the provider to evaluate its policy and make an offer. With an
    /// override, the overridden identity is sent instead of the stored one.
    pub async fn request_offer(
        &self,
        id: NegotiationId,
        identity_override: Option<IdentityOverride>,
    ) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let request = OfferRequest {
            consumer_attributes: identity_override
                .map(|o| self.identity().overridden(&o).attributes()),
        };
        let (mirror, ()) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "offer",
                |n| Ok(n.state.permits(NegotiationAction::Offer)?),
                move || async move { self.peer.offer(id, &request).await.map(|n| (n, ())) },
            )
            .await?;
        Ok(mirror)
    }

    pub async fn agree(&self, id: NegotiationId) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "agree",
                |n| Ok(n.state.permits(NegotiationAction::Agree)?),
                move || async move { self.peer.agree(id).await.map(|n| (n, ())) },
            )
            .await?;
        Ok(mirror)
    }

    pub async fn verify(&self, id: NegotiationId) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "verify",
                |n| Ok(n.state.permits(NegotiationAction::Verify)?),
                move || async move { self.peer.verify(id).await.map(|n| (n, ())) },
            )
            .await?;
        Ok(mirror)
    }

    /// Finalize and keep the issued agreement locally.
    pub async fn finalize(
        &self,
        id: NegotiationId,
    ) -> Result<(Mirrored<Negotiation>, Agreement), ConnectorError> {
        let (mirror, agreement) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "finalize",
                |n| Ok(n.state.permits(NegotiationAction::Finalize)?),
                move || async move {
                    self.peer
                        .finalize(id)
                        .await
                        .map(|r| (r.negotiation, r.agreement))
                },
            )
            .await?;
        self.agreements.put(agreement.clone());
        self.audit.record(
            AuditEventType::NegotiationFinalized,
            json!({ "negotiation_id": id, "agreement_id": agreement.id }),
        );
        Ok((mirror, agreement))
    }

    pub async fn terminate_negotiation(
        &self,
        id: NegotiationId,
        reason: Option<String>,
    ) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let request = ReasonRequest {
            reason: reason.clone(),
        };
        let (mirror, ()) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "terminate",
                |n| Ok(n.state.permits(NegotiationAction::Terminate)?),
                move || async move {
                    self.peer
                        .terminate_negotiation(id, &request)
                        .await
                        .map(|n| (n, ()))
                },
            )
            .await?;
        self.audit.record(
            AuditEventType::NegotiationTerminated,
            json!({ "negotiation_id": id, "reason": reason }),
        );
        Ok(mirror)
    }

    /// Re-fetch the provider's snapshot and confirm the mirror against it.
    pub async fn refresh_negotiation(
        &self,
        id: NegotiationId,
    ) -> Result<Mirrored<Negotiation>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.negotiations.as_ref(),
                id,
                "refresh",
                |_| Ok(()),
                move || async move { self.peer.get_negotiation(id).await.map(|n| (n, ())) },
            )
            .await?;
        Ok(mirror)
    }

    /// Run the whole handshake for an asset and return the agreement.
    ///
    /// Stops with `PolicyDenied` when the provider refuses the offer; the
    /// terminated negotiation stays in the mirror.
    pub async fn negotiate(
        &self,
        asset_id: AssetId,
    ) -> Result<(Mirrored<Negotiation>, Agreement), ConnectorError> {
        let id = self.initiate_negotiation(asset_id).await?.record.id;
        let offered = self.request_offer(id, None).await?;
        if offered.record.state == NegotiationState::Terminated {
            if let Some(evaluation) = offered.record.policy_evaluation.clone() {
                if !evaluation.allowed {
                    return Err(ConnectorError::PolicyDenied {
                        negotiation_id: id,
                        evaluation,
                    });
                }
            }
        }
        self.agree(id).await?;
        self.verify(id).await?;
        self.finalize(id).await
    }

    pub fn negotiation(&self, id: NegotiationId) -> Result<Mirrored<Negotiation>, ConnectorError> {
        self.negotiations
            .get(&id)
            .ok_or(ConnectorError::NegotiationNotFound(id))
    }

    /// All mirrored negotiations, oldest first.
    pub fn negotiations(&self) -> Vec<Mirrored<Negotiation>> {
        let mut all = self.negotiations.list();
        all.sort_by(|a, b| a.record.created_at.cmp(&b.record.created_at));
        all
    }

    // ── Agreements ───────────────────────────────────────────────────

    pub fn agreement(&self, id: AgreementId) -> Result<Agreement, ConnectorError> {
        self.agreements
            .get(&id)
            .ok_or(ConnectorError::AgreementNotFound(id))
    }

    pub fn agreements(&self) -> Vec<Agreement> {
        let mut all = self.agreements.list();
        all.sort_by(|a, b| a.signing_date.cmp(&b.signing_date));
        all
    }

    // ── Transfers ────────────────────────────────────────────────────

    /// Open a transfer under an agreement this consumer holds.
    pub async fn initiate_transfer(
        &self,
        agreement_id: AgreementId,
        options: TransferOptions,
    ) -> Result<Mirrored<Transfer>, ConnectorError> {
        let agreement = self.agreement(agreement_id)?;
        if !agreement.is_active() {
            return Err(ConnectorError::AgreementNotActive {
                agreement_id,
                status: agreement.status,
            });
        }
        let request = CreateTransferRequest {
            agreement_id,
            options,
        };
        let transfer = self
            .peer_call("create_transfer", self.peer.create_transfer(&request))
            .await?;

        let mirror = Mirrored::confirmed(transfer);
        self.transfers.put(mirror.clone());
        tracing::info!(transfer = %mirror.record.id, agreement = %agreement_id, "transfer initiated");
        self.audit.record(
            AuditEventType::TransferInitiated,
            json!({ "transfer_id": mirror.record.id, "agreement_id": agreement_id }),
        );
        Ok(mirror)
    }

    pub async fn start_transfer(&self, id: TransferId) -> Result<Mirrored<Transfer>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.transfers.as_ref(),
                id,
                "start",
                |t| Ok(t.state.permits(TransferAction::Start)?),
                move || async move { self.peer.start_transfer(id).await.map(|t| (t, ())) },
            )
            .await?;
        Ok(mirror)
    }

    /// Complete the transfer; the delivered payload is kept in the mirror.
    pub async fn complete_transfer(
        &self,
        id: TransferId,
    ) -> Result<Mirrored<Transfer>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.transfers.as_ref(),
                id,
                "complete",
                |t| Ok(t.state.permits(TransferAction::Complete)?),
                move || async move { self.peer.complete_transfer(id).await.map(|t| (t, ())) },
            )
            .await?;
        self.audit.record(
            AuditEventType::TransferCompleted,
            json!({ "transfer_id": id, "asset_id": mirror.record.asset_id }),
        );
        Ok(mirror)
    }

    pub async fn suspend_transfer(
        &self,
        id: TransferId,
        reason: Option<String>,
    ) -> Result<Mirrored<Transfer>, ConnectorError> {
        let request = ReasonRequest { reason };
        let (mirror, ()) = self
            .mirror(
                self.transfers.as_ref(),
                id,
                "suspend",
                |t| Ok(t.state.permits(TransferAction::Suspend)?),
                move || async move {
                    self.peer
                        .suspend_transfer(id, &request)
                        .await
                        .map(|t| (t, ()))
                },
            )
            .await?;
        Ok(mirror)
    }

    pub async fn terminate_transfer(
        &self,
        id: TransferId,
        reason: Option<String>,
    ) -> Result<Mirrored<Transfer>, ConnectorError> {
        let request = ReasonRequest { reason };
        let (mirror, ()) = self
            .mirror(
                self.transfers.as_ref(),
                id,
                "terminate",
                |t| Ok(t.state.permits(TransferAction::Terminate)?),
                move || async move {
                    self.peer
                        .terminate_transfer(id, &request)
                        .await
                        .map(|t| (t, ()))
                },
            )
            .await?;
        Ok(mirror)
    }

    pub async fn refresh_transfer(&self, id: TransferId) -> Result<Mirrored<Transfer>, ConnectorError> {
        let (mirror, ()) = self
            .mirror(
                self.transfers.as_ref(),
                id,
                "refresh",
                |_| Ok(()),
                move || async move { self.peer.get_transfer(id).await.map(|t| (t, ())) },
            )
            .await?;
        Ok(mirror)
    }

    pub fn transfer(&self, id: TransferId) -> Result<Mirrored<Transfer>, ConnectorError> {
        self.transfers
            .get(&id)
            .ok_or(ConnectorError::TransferNotFound(id))
    }

    pub fn transfers(&self) -> Vec<Mirrored<Transfer>> {
        let mut all = self.transfers.list();
        all.sort_by(|a, b| a.record.created_at.cmp(&b.record.created_at));
        all
    }

    /// Data received by a completed transfer.
    pub fn received_data(&self, id: TransferId) -> Result<serde_json::Value, ConnectorError> {
        let mirror = self.transfer(id)?;
        let transfer = mirror.record;
        if transfer.state != TransferState::Completed {
            return Err(ConnectorError::DataNotReady {
                transfer_id: id,
                state: transfer.state,
            });
        }
        transfer.data.ok_or(ConnectorError::DataUnavailable {
            asset_id: transfer.asset_id,
        })
    }

    // ── Saga plumbing ────────────────────────────────────────────────

    async fn peer_call<T>(
        &self,
        action: &'static str,
        call: impl Future<Output = Result<T, PeerError>>,
    ) -> Result<T, ConnectorError> {
        let outcome = call.await;
        self.observe(action, &outcome);
        outcome.map_err(ConnectorError::from)
    }

    fn observe<T>(&self, action: &'static str, outcome: &Result<T, PeerError>) {
        match outcome {
            Ok(_) => {
                tracing::debug!(peer = %self.peer.endpoint(), action, "peer call succeeded");
                metrics::counter!("dsc_peer_calls_total", "action" => action, "outcome" => "ok")
                    .increment(1);
            }
            Err(err) => {
                tracing::warn!(peer = %self.peer.endpoint(), action, error = %err, "peer call failed");
                metrics::counter!("dsc_peer_calls_total", "action" => action, "outcome" => "error")
                    .increment(1);
            }
        }
    }

    async fn mirror<T, X, C, F, Fut>(
        &self,
        repo: &dyn Repository<Mirrored<T>>,
        id: T::Id,
        action: &'static str,
        precheck: C,
        call: F,
    ) -> Result<(Mirrored<T>, X), ConnectorError>
    where
        T: Mirrorable,
        X: Send,
        C: FnOnce(&T) -> Result<(), ConnectorError> + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, X), PeerError>>,
    {
        // Phase one: claim the record.
        let claimed = try_update(repo, &id, |m: &mut Mirrored<T>| {
            if m.sync_status == SyncStatus::Pending {
                return Err(ConnectorError::OperationInFlight {
                    id: m.record.record_id().to_string(),
                    action: m.pending_action.clone().unwrap_or_default(),
                });
            }
            if m.sync_status == SyncStatus::Confirmed {
                precheck(&m.record)?;
            }
            m.sync_status = SyncStatus::Pending;
            m.pending_action = Some(action.to_string());
            Ok(())
        })
        .ok_or_else(|| T::not_found(&id))?;
        claimed?;

        let mut guard = InFlight {
            repo,
            id: id.clone(),
            armed: true,
        };
        let outcome = call().await;
        guard.armed = false;
        self.observe(action, &outcome);

        // Phase two: settle.
        match outcome {
            Ok((snapshot, extra)) => {
                let (committed, ()) = try_update(repo, &id, move |m: &mut Mirrored<T>| {
                    m.confirm(snapshot);
                    Ok(())
                })
                .ok_or_else(|| T::not_found(&id))??;
                tracing::info!(id = %id, action, "mirror confirmed");
                Ok((committed, extra))
            }
            Err(err) => {
                let message = err.to_string();
                match try_update(repo, &id, move |m: &mut Mirrored<T>| {
                    m.mark_unconfirmed(message);
                    Ok(())
                }) {
                    Some(Ok(_)) => tracing::warn!(id = %id, action, "mirror left unconfirmed"),
                    Some(Err(settle)) => {
                        tracing::debug!(id = %id, action, error = %settle, "could not mark mirror unconfirmed")
                    }
                    None => tracing::debug!(id = %id, action, "mirror removed while the peer call was in flight"),
                }
                Err(err.into())
            }
        }
    }
}
