//! # Provider Connector
//!
//! The authoritative side of the dataspace handshake. It owns the
//! negotiation, agreement, and transfer repositories, resolves each asset's
//! policy from the registry, and drives the state machines in `dsc-state`.
//!
//! Every transition runs inside [`Repository::update`], so concurrent calls
//! on the same id are serialized and at most one of two racing transitions
//! succeeds. Finalization inserts the agreement while the negotiation's
//! entry lock is held.
//!
//! Each successful transition emits a `tracing` event, bumps the
//! `dsc_transitions_total` counter, and records an audit event. Audit
//! recording never fails a transition.

use std::sync::Arc;

use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, PolicyKey, Timestamp, TransferId};
use dsc_policy::{describe, EvaluationContext, Policy, PolicyRegistry};
use dsc_state::{
    Agreement, Negotiation, NegotiationAction, NegotiationHistoryEntry, NegotiationRequest,
    Transfer, TransferAction, TransferOptions, TransferState,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEventType, AuditSink, NullAudit};
use crate::catalog::{preview, sample_provider_id, Asset, AssetCatalog, InMemoryCatalog};
use crate::error::ConnectorError;
use crate::peer::CreateNegotiationRequest;
use crate::store::{try_update, MemoryStore, Repository};

/// Actor recorded when a negotiation is terminated on request.
pub const TERMINATION_ACTOR: &str = "user";

const DEFAULT_TERMINATION_REASON: &str = "user requested termination";

// ─── Read models ─────────────────────────────────────────────────────

/// A catalog entry: the asset together with the policy it is offered under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(flatten)]
    pub asset: Asset,
    pub policy: Policy,
    pub policy_description: String,
}

/// First-level view of an asset's payload, available without an agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPreview {
    pub asset_id: AssetId,
    pub name: String,
    pub description: String,
    pub content_type: String,
    /// `None` when the catalog has no payload for the asset.
    pub preview: Option<serde_json::Value>,
}

/// Payload of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferData {
    pub transfer_id: TransferId,
    pub asset_id: AssetId,
    pub consumer_id: ParticipantId,
    pub transferred_at: Option<Timestamp>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorStatistics {
    pub assets: usize,
    pub active_negotiations: usize,
    pub agreements: usize,
    pub active_agreements: usize,
    pub active_transfers: usize,
    pub completed_transfers: usize,
}

// ─── Connector ───────────────────────────────────────────────────────

/// Provider-side connector.
pub struct ProviderConnector {
    participant_id: ParticipantId,
    policies: PolicyRegistry,
    catalog: Arc<dyn AssetCatalog>,
    negotiations: Arc<dyn Repository<Negotiation>>,
    agreements: Arc<dyn Repository<Agreement>>,
    transfers: Arc<dyn Repository<Transfer>>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for ProviderConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConnector")
            .field("participant_id", &self.participant_id)
            .field("policies", &self.policies.len())
            .field("negotiations", &self.negotiations.len())
            .field("agreements", &self.agreements.len())
            .field("transfers", &self.transfers.len())
            .finish()
    }
}

impl ProviderConnector {
    /// A provider with the standard policies, in-memory repositories, and
    /// no audit sink.
    pub fn new(participant_id: ParticipantId, catalog: Arc<dyn AssetCatalog>) -> Self {
        Self {
            participant_id,
            policies: PolicyRegistry::standard(),
            catalog,
            negotiations: Arc::new(MemoryStore::new()),
            agreements: Arc::new(MemoryStore::new()),
            transfers: Arc::new(MemoryStore::new()),
            audit: Arc::new(NullAudit),
        }
    }

    /// The demo provider over the sample catalog.
    pub fn sample() -> Self {
        Self::new(sample_provider_id(), Arc::new(InMemoryCatalog::sample()))
    }

    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_repositories(
        mut self,
        negotiations: Arc<dyn Repository<Negotiation>>,
        agreements: Arc<dyn Repository<Agreement>>,
        transfers: Arc<dyn Repository<Transfer>>,
    ) -> Self {
        self.negotiations = negotiations;
        self.agreements = agreements;
        self.transfers = transfers;
        self
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    fn policy(&self, key: &PolicyKey) -> Result<&Policy, ConnectorError> {
        self.policies
            .get(key)
            .ok_or_else(|| ConnectorError::PolicyNotFound(key.clone()))
    }

    fn asset(&self, id: &AssetId) -> Result<Asset, ConnectorError> {
        self.catalog
            .get_asset(id)
            .ok_or_else(|| ConnectorError::AssetNotFound(id.clone()))
    }

    // ── Negotiations ─────────────────────────────────────────────────

    /// Open a negotiation for a catalog asset (→ REQUESTED).
    pub fn create_negotiation(
        &self,
        request: CreateNegotiationRequest,
    ) -> Result<Negotiation, ConnectorError> {
        let asset = self.asset(&request.asset_id)?;
        self.policy(&asset.policy_id)?;

        let negotiation = Negotiation::request(NegotiationRequest {
            provider_id: self.participant_id.clone(),
            consumer_id: request.consumer_id,
            asset_id: asset.id,
            policy_id: asset.policy_id,
            consumer_attributes: request.consumer_attributes,
            callback_address: request.callback_address,
        });
        self.negotiations.put(negotiation.clone());

        tracing::info!(
            negotiation = %negotiation.id,
            asset = %negotiation.asset_id,
            consumer = %negotiation.consumer_id,
            policy = %negotiation.policy_id,
            "negotiation requested"
        );
        count_transition("negotiation", "request", "ok");
        self.audit.record(
            AuditEventType::NegotiationInitiated,
            json!({
                "negotiation_id": negotiation.id,
                "asset_id": negotiation.asset_id,
                "consumer_id": negotiation.consumer_id,
            }),
        );
        Ok(negotiation)
    }

    /// Evaluate the asset's policy and offer or terminate
    /// (REQUESTED → OFFERED | TERMINATED).
    ///
    /// A denial is not an error here: the negotiation is returned in
    /// TERMINATED with the decision attached.
    pub fn offer(
        &self,
        id: NegotiationId,
        attribute_override: Option<EvaluationContext>,
    ) -> Result<Negotiation, ConnectorError> {
        let policy = self.policy(&self.negotiation(id)?.policy_id)?;
        let (negotiation, decision) =
            self.update_negotiation(id, NegotiationAction::Offer, |n| {
                Ok(n.offer(policy, attribute_override)?)
            })?;

        if decision.allowed {
            self.audit.record(
                AuditEventType::NegotiationOffered,
                json!({ "negotiation_id": id }),
            );
        } else {
            tracing::info!(negotiation = %id, reason = %decision.reason, "offer denied by policy");
            self.audit.record(
                AuditEventType::NegotiationTerminated,
                json!({ "negotiation_id": id, "reason": decision.reason }),
            );
        }
        Ok(negotiation)
    }

    /// OFFERED → AGREED.
    pub fn agree(&self, id: NegotiationId) -> Result<Negotiation, ConnectorError> {
        let (negotiation, ()) =
            self.update_negotiation(id, NegotiationAction::Agree, |n| Ok(n.agree()?))?;
        self.audit
            .record(AuditEventType::NegotiationAgreed, json!({ "negotiation_id": id }));
        Ok(negotiation)
    }

    /// AGREED → VERIFIED.
    pub fn verify(&self, id: NegotiationId) -> Result<Negotiation, ConnectorError> {
        let (negotiation, ()) =
            self.update_negotiation(id, NegotiationAction::Verify, |n| Ok(n.verify()?))?;
        self.audit
            .record(AuditEventType::NegotiationVerified, json!({ "negotiation_id": id }));
        Ok(negotiation)
    }

    /// VERIFIED → FINALIZED, issuing the negotiation's only agreement.
    pub fn finalize(&self, id: NegotiationId) -> Result<(Negotiation, Agreement), ConnectorError> {
        let description = describe(self.policy(&self.negotiation(id)?.policy_id)?);
        let agreements = &self.agreements;
        let (negotiation, agreement) =
            self.update_negotiation(id, NegotiationAction::Finalize, |n| {
                let agreement = n.finalize(description)?;
                agreements.put(agreement.clone());
                Ok(agreement)
            })?;

        tracing::info!(negotiation = %id, agreement = %agreement.id, "agreement issued");
        self.audit.record(
            AuditEventType::NegotiationFinalized,
            json!({
                "negotiation_id": id,
                "agreement_id": agreement.id,
                "asset_id": agreement.asset_id,
            }),
        );
        Ok((negotiation, agreement))
    }

    /// Any non-terminal state → TERMINATED.
    pub fn terminate_negotiation(
        &self,
        id: NegotiationId,
        reason: Option<String>,
    ) -> Result<Negotiation, ConnectorError> {
        let reason = reason.unwrap_or_else(|| DEFAULT_TERMINATION_REASON.to_string());
        let (negotiation, ()) =
            self.update_negotiation(id, NegotiationAction::Terminate, |n| {
                Ok(n.terminate(TERMINATION_ACTOR, &reason)?)
            })?;
        self.audit.record(
            AuditEventType::NegotiationTerminated,
            json!({ "negotiation_id": id, "reason": reason }),
        );
        Ok(negotiation)
    }

    pub fn negotiation(&self, id: NegotiationId) -> Result<Negotiation, ConnectorError> {
        self.negotiations
            .get(&id)
            .ok_or(ConnectorError::NegotiationNotFound(id))
    }

    /// All negotiations, oldest first.
    pub fn negotiations(&self) -> Vec<Negotiation> {
        let mut all = self.negotiations.list();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn negotiation_history(
        &self,
        id: NegotiationId,
    ) -> Result<Vec<NegotiationHistoryEntry>, ConnectorError> {
        Ok(self.negotiation(id)?.history)
    }

    fn update_negotiation<R, F>(
        &self,
        id: NegotiationId,
        action: NegotiationAction,
        f: F,
    ) -> Result<(Negotiation, R), ConnectorError>
    where
        R: Send,
        F: FnOnce(&mut Negotiation) -> Result<R, ConnectorError> + Send,
    {
        let outcome = try_update(self.negotiations.as_ref(), &id, f)
            .ok_or(ConnectorError::NegotiationNotFound(id))?;
        match &outcome {
            Ok((negotiation, _)) => {
                tracing::info!(negotiation = %id, action = %action, state = %negotiation.state, "negotiation transition");
                count_transition("negotiation", action.as_str(), "ok");
            }
            Err(err) => {
                tracing::warn!(negotiation = %id, action = %action, error = %err, "negotiation transition rejected");
                count_transition("negotiation", action.as_str(), "rejected");
            }
        }
        outcome
    }

    // ── Agreements ───────────────────────────────────────────────────

    pub fn agreement(&self, id: AgreementId) -> Result<Agreement, ConnectorError> {
        self.agreements
            .get(&id)
            .ok_or(ConnectorError::AgreementNotFound(id))
    }

    /// All agreements, oldest first.
    pub fn agreements(&self) -> Vec<Agreement> {
        let mut all = self.agreements.list();
        all.sort_by(|a, b| a.signing_date.cmp(&b.signing_date).then(a.id.cmp(&b.id)));
        all
    }

    /// ACTIVE → TERMINATED. Transfers already running are unaffected.
    pub fn terminate_agreement(
        &self,
        id: AgreementId,
        reason: Option<String>,
    ) -> Result<Agreement, ConnectorError> {
        let reason = reason.unwrap_or_else(|| DEFAULT_TERMINATION_REASON.to_string());
        let (agreement, ()) = try_update(self.agreements.as_ref(), &id, |a| {
            Ok(a.terminate(reason.clone())?)
        })
        .ok_or(ConnectorError::AgreementNotFound(id))??;

        tracing::info!(agreement = %id, "agreement terminated");
        count_transition("agreement", "terminate", "ok");
        self.audit.record(
            AuditEventType::AgreementTerminated,
            json!({ "agreement_id": id, "reason": reason }),
        );
        Ok(agreement)
    }

    // ── Transfers ────────────────────────────────────────────────────

    /// Open a transfer under an ACTIVE agreement (→ REQUESTED).
    pub fn create_transfer(
        &self,
        agreement_id: AgreementId,
        options: TransferOptions,
    ) -> Result<Transfer, ConnectorError> {
        // Holding the agreement's lock keeps a concurrent termination out.
        let (_, transfer) = try_update(self.agreements.as_ref(), &agreement_id, |agreement| {
            Ok(Transfer::request(agreement, options)?)
        })
        .ok_or(ConnectorError::AgreementNotFound(agreement_id))??;
        self.transfers.put(transfer.clone());

        tracing::info!(transfer = %transfer.id, agreement = %agreement_id, "transfer requested");
        count_transition("transfer", "request", "ok");
        self.audit.record(
            AuditEventType::TransferInitiated,
            json!({ "transfer_id": transfer.id, "agreement_id": agreement_id }),
        );
        Ok(transfer)
    }

    /// REQUESTED → STARTED.
    pub fn start_transfer(&self, id: TransferId) -> Result<Transfer, ConnectorError> {
        let (transfer, ()) =
            self.update_transfer(id, TransferAction::Start, |t| Ok(t.start()?))?;
        self.audit
            .record(AuditEventType::TransferStarted, json!({ "transfer_id": id }));
        Ok(transfer)
    }

    /// Load the asset payload and attach it (STARTED → COMPLETED).
    ///
    /// Fails with `DataUnavailable` when the catalog has no payload; the
    /// transfer then stays STARTED.
    pub fn complete_transfer(&self, id: TransferId) -> Result<Transfer, ConnectorError> {
        let catalog = &self.catalog;
        let (transfer, ()) = self.update_transfer(id, TransferAction::Complete, |t| {
            t.state.permits(TransferAction::Complete)?;
            let data = catalog
                .get_asset_data(&t.asset_id)
                .ok_or_else(|| ConnectorError::DataUnavailable {
                    asset_id: t.asset_id.clone(),
                })?;
            Ok(t.complete(data)?)
        })?;
        self.audit.record(
            AuditEventType::TransferCompleted,
            json!({ "transfer_id": id, "asset_id": transfer.asset_id }),
        );
        Ok(transfer)
    }

    /// STARTED → SUSPENDED.
    pub fn suspend_transfer(
        &self,
        id: TransferId,
        reason: Option<String>,
    ) -> Result<Transfer, ConnectorError> {
        let (transfer, ()) =
            self.update_transfer(id, TransferAction::Suspend, |t| Ok(t.suspend(reason)?))?;
        self.audit
            .record(AuditEventType::TransferSuspended, json!({ "transfer_id": id }));
        Ok(transfer)
    }

    /// Any non-terminal state → TERMINATED.
    pub fn terminate_transfer(
        &self,
        id: TransferId,
        reason: Option<String>,
    ) -> Result<Transfer, ConnectorError> {
        let (transfer, ()) =
            self.update_transfer(id, TransferAction::Terminate, |t| Ok(t.terminate(reason)?))?;
        self.audit
            .record(AuditEventType::TransferTerminated, json!({ "transfer_id": id }));
        Ok(transfer)
    }

    pub fn transfer(&self, id: TransferId) -> Result<Transfer, ConnectorError> {
        self.transfers
            .get(&id)
            .ok_or(ConnectorError::TransferNotFound(id))
    }

    /// All transfers, oldest first.
    pub fn transfers(&self) -> Vec<Transfer> {
        let mut all = self.transfers.list();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// The delivered payload of a COMPLETED transfer.
    pub fn transfer_data(&self, id: TransferId) -> Result<TransferData, ConnectorError> {
        let transfer = self.transfer(id)?;
        if transfer.state != TransferState::Completed {
            return Err(ConnectorError::DataNotReady {
                transfer_id: id,
                state: transfer.state,
            });
        }
        let data = transfer.data.ok_or_else(|| ConnectorError::DataUnavailable {
            asset_id: transfer.asset_id.clone(),
        })?;
        self.audit.record(
            AuditEventType::DataAccessed,
            json!({ "transfer_id": id, "consumer_id": transfer.consumer_id }),
        );
        Ok(TransferData {
            transfer_id: id,
            asset_id: transfer.asset_id,
            consumer_id: transfer.consumer_id,
            transferred_at: transfer.completed_at,
            data,
        })
    }

    fn update_transfer<R, F>(
        &self,
        id: TransferId,
        action: TransferAction,
        f: F,
    ) -> Result<(Transfer, R), ConnectorError>
    where
        R: Send,
        F: FnOnce(&mut Transfer) -> Result<R, ConnectorError> + Send,
    {
        let outcome = try_update(self.transfers.as_ref(), &id, f)
            .ok_or(ConnectorError::TransferNotFound(id))?;
        match &outcome {
            Ok((transfer, _)) => {
                tracing::info!(transfer = %id, action = %action, state = %transfer.state, "transfer transition");
                count_transition("transfer", action.as_str(), "ok");
            }
            Err(err) => {
                tracing::warn!(transfer = %id, action = %action, error = %err, "transfer transition rejected");
                count_transition("transfer", action.as_str(), "rejected");
            }
        }
        outcome
    }

    // ── Catalog ──────────────────────────────────────────────────────

    fn dataset_for(&self, asset: Asset) -> Result<Dataset, ConnectorError> {
        let policy = self.policy(&asset.policy_id)?.clone();
        Ok(Dataset {
            policy_description: describe(&policy),
            asset,
            policy,
        })
    }

    /// Every published asset with its policy, in catalog order.
    pub fn catalog(&self) -> Result<Vec<Dataset>, ConnectorError> {
        self.catalog
            .list_assets()
            .into_iter()
            .map(|asset| self.dataset_for(asset))
            .collect()
    }

    pub fn dataset(&self, asset_id: &AssetId) -> Result<Dataset, ConnectorError> {
        self.dataset_for(self.asset(asset_id)?)
    }

    pub fn preview(&self, asset_id: &AssetId) -> Result<AssetPreview, ConnectorError> {
        let asset = self.asset(asset_id)?;
        let summary = self.catalog.get_asset_data(asset_id).map(|data| preview(&data));
        Ok(AssetPreview {
            asset_id: asset.id,
            name: asset.name,
            description: asset.description,
            content_type: asset.content_type,
            preview: summary,
        })
    }

    // ── Housekeeping ─────────────────────────────────────────────────

    pub fn statistics(&self) -> ConnectorStatistics {
        let negotiations = self.negotiations.list();
        let agreements = self.agreements.list();
        let transfers = self.transfers.list();
        ConnectorStatistics {
            assets: self.catalog.list_assets().len(),
            active_negotiations: negotiations.iter().filter(|n| !n.is_terminal()).count(),
            agreements: agreements.len(),
            active_agreements: agreements.iter().filter(|a| a.is_active()).count(),
            active_transfers: transfers.iter().filter(|t| !t.is_terminal()).count(),
            completed_transfers: transfers
                .iter()
                .filter(|t| t.state == TransferState::Completed)
                .count(),
        }
    }

    /// Drop all negotiations, agreements, and transfers. The catalog and
    /// policies are kept.
    pub fn reset(&self) {
        self.negotiations.clear();
        self.agreements.clear();
        self.transfers.clear();
        tracing::info!("provider state reset");
    }
}

fn count_transition(entity: &'static str, action: &'static str, outcome: &'static str) {
    metrics::counter!(
        "dsc_transitions_total",
        "entity" => entity,
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use dsc_state::NegotiationState;
    use serde_json::Map;

    fn consumer() -> ParticipantId {
        ParticipantId::from_static("consumer-tierone-supplier")
    }

    fn tier1_context() -> EvaluationContext {
        EvaluationContext::new()
            .with("partner_type", "tier1_supplier")
            .with("region", "EU")
            .with("certification", vec!["TISAX", "ISO27001", "IATF16949"])
            .with("purpose", "quality_analysis")
    }

    fn open(provider: &ProviderConnector, asset: &'static str, ctx: EvaluationContext) -> Negotiation {
        provider
            .create_negotiation(CreateNegotiationRequest {
                consumer_id: consumer(),
                asset_id: AssetId::from_static(asset),
                consumer_attributes: ctx,
                callback_address: None,
            })
            .unwrap()
    }

    fn agreement_for(provider: &ProviderConnector) -> Agreement {
        let n = open(provider, "part-catalog-2024", tier1_context());
        provider.offer(n.id, None).unwrap();
        provider.agree(n.id).unwrap();
        provider.verify(n.id).unwrap();
        provider.finalize(n.id).unwrap().1
    }

    #[test]
    fn test_unknown_asset_is_not_found() {
        let provider = ProviderConnector::sample();
        let err = provider
            .create_negotiation(CreateNegotiationRequest {
                consumer_id: consumer(),
                asset_id: AssetId::from_static("nope"),
                consumer_attributes: EvaluationContext::new(),
                callback_address: None,
            })
            .unwrap_err();
        assert_eq!(err, ConnectorError::AssetNotFound(AssetId::from_static("nope")));
    }

    #[test]
    fn test_asset_bound_to_unknown_policy() {
        let provider = ProviderConnector::sample().with_policies(PolicyRegistry::new());
        let err = provider
            .create_negotiation(CreateNegotiationRequest {
                consumer_id: consumer(),
                asset_id: AssetId::from_static("part-catalog-2024"),
                consumer_attributes: EvaluationContext::new(),
                callback_address: None,
            })
            .unwrap_err();
        assert!(matches!(err, ConnectorError::PolicyNotFound(_)));
    }

    #[test]
    fn test_denied_offer_returns_terminated_negotiation() {
        let provider = ProviderConnector::sample();
        let n = open(
            &provider,
            "quality-metrics-q4",
            tier1_context().with("purpose", "cost_reduction"),
        );
        let offered = provider.offer(n.id, None).unwrap();
        assert_eq!(offered.state, NegotiationState::Terminated);
        assert!(offered.denied_by_policy());
        assert_eq!(
            offered.policy_evaluation.unwrap().reason,
            "no matching permission found"
        );
    }

    #[test]
    fn test_offer_override_replaces_attributes() {
        let provider = ProviderConnector::sample();
        let n = open(&provider, "part-catalog-2024", EvaluationContext::new());
        let offered = provider.offer(n.id, Some(tier1_context())).unwrap();
        assert_eq!(offered.state, NegotiationState::Offered);
        assert_eq!(offered.consumer_attributes, tier1_context());
    }

    #[test]
    fn test_finalize_stores_single_agreement() {
        let provider = ProviderConnector::sample();
        let agreement = agreement_for(&provider);
        assert_eq!(provider.agreements().len(), 1);
        assert_eq!(provider.agreement(agreement.id).unwrap(), agreement);
        assert_eq!(
            agreement.policy_description,
            "Allows USE when: partner_type eq tier1_supplier; Prohibits DISTRIBUTE"
        );

        let err = provider.finalize(agreement.negotiation_id).unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidStateTransition { .. }));
        assert_eq!(provider.agreements().len(), 1);
    }

    #[test]
    fn test_rejected_transition_leaves_history_untouched() {
        let provider = ProviderConnector::sample();
        let n = open(&provider, "part-catalog-2024", tier1_context());
        let err = provider.agree(n.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot agree negotiation in state REQUESTED; expected OFFERED"
        );
        assert_eq!(provider.negotiation(n.id).unwrap(), n);
    }

    #[test]
    fn test_terminate_negotiation_records_user_actor() {
        let provider = ProviderConnector::sample();
        let n = open(&provider, "part-catalog-2024", tier1_context());
        let terminated = provider.terminate_negotiation(n.id, None).unwrap();
        let last = terminated.history.last().unwrap();
        assert_eq!(last.actor.as_deref(), Some(TERMINATION_ACTOR));
        assert_eq!(last.detail.as_deref(), Some(DEFAULT_TERMINATION_REASON));
    }

    #[test]
    fn test_transfer_lifecycle_delivers_payload() {
        let provider = ProviderConnector::sample();
        let agreement = agreement_for(&provider);
        let t = provider
            .create_transfer(agreement.id, TransferOptions::default())
            .unwrap();
        assert!(matches!(
            provider.transfer_data(t.id),
            Err(ConnectorError::DataNotReady { .. })
        ));
        provider.start_transfer(t.id).unwrap();
        let done = provider.complete_transfer(t.id).unwrap();
        assert_eq!(done.state, TransferState::Completed);

        let data = provider.transfer_data(t.id).unwrap();
        assert_eq!(data.data["metadata"]["catalog_version"], "2024.4");
        assert_eq!(data.transferred_at, done.completed_at);
    }

    fn assert_completion_unavailable(payload: Option<serde_json::Value>) {
        let asset = Asset {
            id: AssetId::from_static("no-data"),
            name: "No data".into(),
            description: String::new(),
            content_type: "application/json".into(),
            policy_id: PolicyKey::from_static("open-access"),
            properties: Map::new(),
            data_ref: None,
        };
        let catalog = InMemoryCatalog::new().with_asset(asset, payload);
        let provider = ProviderConnector::new(sample_provider_id(), Arc::new(catalog));
        let n = open(&provider, "no-data", EvaluationContext::new());
        provider.offer(n.id, None).unwrap();
        provider.agree(n.id).unwrap();
        provider.verify(n.id).unwrap();
        let (_, agreement) = provider.finalize(n.id).unwrap();
        let t = provider
            .create_transfer(agreement.id, TransferOptions::default())
            .unwrap();
        provider.start_transfer(t.id).unwrap();

        let err = provider.complete_transfer(t.id).unwrap_err();
        assert_eq!(
            err,
            ConnectorError::DataUnavailable {
                asset_id: AssetId::from_static("no-data")
            }
        );
        let after = provider.transfer(t.id).unwrap();
        assert_eq!(after.state, TransferState::Started);
        assert!(after.data.is_none());
    }

    #[test]
    fn test_complete_without_payload_stays_started() {
        assert_completion_unavailable(None);
    }

    #[test]
    fn test_complete_with_null_payload_stays_started() {
        assert_completion_unavailable(Some(serde_json::Value::Null));
    }

    #[test]
    fn test_terminated_agreement_refuses_new_transfers() {
        let provider = ProviderConnector::sample();
        let agreement = agreement_for(&provider);
        provider.terminate_agreement(agreement.id, None).unwrap();
        let err = provider
            .create_transfer(agreement.id, TransferOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConnectorError::AgreementNotActive { .. }));
        assert!(provider.transfers().is_empty());

        assert!(matches!(
            provider.terminate_agreement(agreement.id, None),
            Err(ConnectorError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_agreement_for_transfer() {
        let provider = ProviderConnector::sample();
        let id = AgreementId::new();
        assert_eq!(
            provider.create_transfer(id, TransferOptions::default()),
            Err(ConnectorError::AgreementNotFound(id))
        );
    }

    #[test]
    fn test_catalog_and_preview() {
        let provider = ProviderConnector::sample();
        let catalog = provider.catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[1].policy.id, "policy-quality-data");

        let p = provider.preview(&AssetId::from_static("part-catalog-2024")).unwrap();
        let summary = p.preview.unwrap();
        assert_eq!(summary["parts"], "<array with 3 items>");
    }

    #[test]
    fn test_audit_events_follow_transitions() {
        let log = Arc::new(AuditLog::default());
        let provider = ProviderConnector::sample().with_audit(log.clone());
        agreement_for(&provider);
        let kinds: Vec<AuditEventType> = log.entries().iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventType::NegotiationInitiated,
                AuditEventType::NegotiationOffered,
                AuditEventType::NegotiationAgreed,
                AuditEventType::NegotiationVerified,
                AuditEventType::NegotiationFinalized,
            ]
        );
    }

    #[test]
    fn test_statistics_and_reset() {
        let provider = ProviderConnector::sample();
        let agreement = agreement_for(&provider);
        open(&provider, "part-catalog-2024", tier1_context());
        provider
            .create_transfer(agreement.id, TransferOptions::default())
            .unwrap();

        let stats = provider.statistics();
        assert_eq!(stats.assets, 3);
        assert_eq!(stats.active_negotiations, 1);
        assert_eq!(stats.agreements, 1);
        assert_eq!(stats.active_transfers, 1);

        provider.reset();
        assert!(provider.negotiations().is_empty());
        assert_eq!(provider.statistics().assets, 3);
    }

    #[test]
    fn test_racing_finalize_issues_one_agreement() {
        let provider = Arc::new(ProviderConnector::sample());
        let n = open(&provider, "part-catalog-2024", tier1_context());
        provider.offer(n.id, None).unwrap();
        provider.agree(n.id).unwrap();
        provider.verify(n.id).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || provider.finalize(n.id).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(provider.agreements().len(), 1);
    }
}
