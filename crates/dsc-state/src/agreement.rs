//! # Agreement Issuer
//!
//! An [`Agreement`] is the durable outcome of a finalized negotiation. It is
//! only ever constructed by [`Negotiation::finalize()`](crate::Negotiation::finalize),
//! which runs its guard first, so each negotiation yields at most one
//! agreement. After issuance the only permitted change is termination.

use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, PolicyKey, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::negotiation::Negotiation;

/// Whether an agreement still authorizes transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Active,
    Terminated,
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::Terminated => "TERMINATED",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgreementError {
    #[error("{id} is already terminated")]
    AlreadyTerminated { id: AgreementId },
}

/// A contract agreement between provider and consumer for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub negotiation_id: NegotiationId,
    pub asset_id: AssetId,
    pub policy_id: PolicyKey,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub signing_date: Timestamp,
    pub status: AgreementStatus,
    /// Rendering of the policy as it stood at signing time.
    pub policy_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

impl Agreement {
    pub(crate) fn issue(negotiation: &Negotiation, policy_description: String) -> Self {
        Self {
            id: AgreementId::new(),
            negotiation_id: negotiation.id,
            asset_id: negotiation.asset_id.clone(),
            policy_id: negotiation.policy_id.clone(),
            provider_id: negotiation.provider_id.clone(),
            consumer_id: negotiation.consumer_id.clone(),
            signing_date: Timestamp::now(),
            status: AgreementStatus::Active,
            policy_description,
            terminated_at: None,
            termination_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }

    /// Revoke the agreement. Existing transfers are unaffected; new ones
    /// are refused.
    pub fn terminate(&mut self, reason: impl Into<String>) -> Result<(), AgreementError> {
        if !self.is_active() {
            return Err(AgreementError::AlreadyTerminated { id: self.id });
        }
        self.status = AgreementStatus::Terminated;
        self.terminated_at = Some(Timestamp::now());
        self.termination_reason = Some(reason.into());
        Ok(())
    }
}
