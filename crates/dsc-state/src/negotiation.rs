//! # Contract Negotiation State Machine
//!
//! ```text
//! REQUESTED ──▶ OFFERED ──▶ AGREED ──▶ VERIFIED ──▶ FINALIZED
//!     │            │           │           │
//!     └────────────┴───────────┴───────────┴──▶ TERMINATED
//! ```
//!
//! ## Guards
//!
//! | Action      | Requires                 | Actor recorded   |
//! |-------------|--------------------------|------------------|
//! | `offer`     | REQUESTED                | provider id      |
//! | `agree`     | OFFERED                  | consumer id      |
//! | `verify`    | AGREED                   | `system`         |
//! | `finalize`  | VERIFIED                 | `system`         |
//! | `terminate` | any non-terminal state   | caller supplied  |
//!
//! A guard violation returns [`NegotiationError::InvalidTransition`] naming
//! the current and expected state, and the negotiation is left exactly as
//! it was.

use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, PolicyKey, Timestamp};
use dsc_policy::{evaluate, EvaluationContext, Policy, PolicyDecision};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agreement::Agreement;
use crate::history::{append, HistoryEntry};

/// Actor recorded for transitions the provider performs on its own.
pub const SYSTEM_ACTOR: &str = "system";

// ─── Negotiation State ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationState {
    Requested,
    Offered,
    Agreed,
    Verified,
    /// Agreement issued (terminal).
    Finalized,
    /// Cancelled or denied by policy (terminal).
    Terminated,
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Terminated)
    }

    /// Check whether `action` may run from this state.
    pub fn permits(&self, action: NegotiationAction) -> Result<(), NegotiationError> {
        let allowed = match action.required_state() {
            Some(required) => *self == required,
            None => !self.is_terminal(),
        };
        if allowed {
            Ok(())
        } else {
            Err(NegotiationError::InvalidTransition {
                action,
                current: *self,
                expected: action.expected(),
            })
        }
    }
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "REQUESTED",
            Self::Offered => "OFFERED",
            Self::Agreed => "AGREED",
            Self::Verified => "VERIFIED",
            Self::Finalized => "FINALIZED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// Transitions a caller can request on an existing negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationAction {
    Offer,
    Agree,
    Verify,
    Finalize,
    Terminate,
}

impl NegotiationAction {
    /// The single state this action runs from; `None` means any non-terminal state.
    pub fn required_state(&self) -> Option<NegotiationState> {
        match self {
            Self::Offer => Some(NegotiationState::Requested),
            Self::Agree => Some(NegotiationState::Offered),
            Self::Verify => Some(NegotiationState::Agreed),
            Self::Finalize => Some(NegotiationState::Verified),
            Self::Terminate => None,
        }
    }

    fn expected(&self) -> String {
        match self.required_state() {
            Some(state) => state.to_string(),
            None => "a non-terminal state".to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Agree => "agree",
            Self::Verify => "verify",
            Self::Finalize => "finalize",
            Self::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for NegotiationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NegotiationError {
    /// Attempted transition is not valid from the current state.
    #[error("cannot {action} negotiation in state {current}; expected {expected}")]
    InvalidTransition {
        action: NegotiationAction,
        current: NegotiationState,
        expected: String,
    },
}

// ─── Negotiation ─────────────────────────────────────────────────────

/// Everything needed to open a negotiation.
#[derive(Debug, Clone)]
pub struct NegotiationRequest {
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub asset_id: AssetId,
    /// Policy the asset is published under.
    pub policy_id: PolicyKey,
    pub consumer_attributes: EvaluationContext,
    pub callback_address: Option<String>,
}

pub type NegotiationHistoryEntry = HistoryEntry<NegotiationState>;

/// A contract negotiation for one asset between one provider and one consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationId,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub asset_id: AssetId,
    pub policy_id: PolicyKey,
    pub state: NegotiationState,
    pub consumer_attributes: EvaluationContext,
    /// Set by `offer`, whatever the outcome.
    pub policy_evaluation: Option<PolicyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_address: Option<String>,
    /// Set by `finalize`; never reassigned.
    pub agreement_id: Option<AgreementId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub history: Vec<NegotiationHistoryEntry>,
}

impl Negotiation {
    /// Open a negotiation in REQUESTED.
    pub fn request(request: NegotiationRequest) -> Self {
        let mut history = Vec::new();
        let now = append(
            &mut history,
            NegotiationState::Requested,
            Some(request.consumer_id.as_str()),
            None,
        );
        Self {
            id: NegotiationId::new(),
            provider_id: request.provider_id,
            consumer_id: request.consumer_id,
            asset_id: request.asset_id,
            policy_id: request.policy_id,
            state: NegotiationState::Requested,
            consumer_attributes: request.consumer_attributes,
            policy_evaluation: None,
            callback_address: request.callback_address,
            agreement_id: None,
            created_at: now,
            updated_at: now,
            history,
        }
    }

    /// Evaluate `policy` and move to OFFERED if allowed, TERMINATED if not
    /// (REQUESTED → OFFERED | TERMINATED).
    ///
    /// An override replaces the stored consumer attributes before
    /// evaluation. The decision is stored either way and returned.
    pub fn offer(
        &mut self,
        policy: &Policy,
        attribute_override: Option<EvaluationContext>,
    ) -> Result<PolicyDecision, NegotiationError> {
        self.state.permits(NegotiationAction::Offer)?;

        if let Some(attributes) = attribute_override {
            self.consumer_attributes = attributes;
        }
        let decision = evaluate(policy, &self.consumer_attributes);
        let provider = self.provider_id.to_string();

        if decision.allowed {
            self.do_transition(
                NegotiationState::Offered,
                &provider,
                Some("policy evaluation PASSED".to_string()),
            );
        } else {
            self.do_transition(
                NegotiationState::Terminated,
                &provider,
                Some(format!("policy evaluation FAILED: {}", decision.reason)),
            );
        }
        self.policy_evaluation = Some(decision.clone());
        Ok(decision)
    }

    /// Consumer accepts the offer (OFFERED → AGREED).
    pub fn agree(&mut self) -> Result<(), NegotiationError> {
        self.state.permits(NegotiationAction::Agree)?;
        let consumer = self.consumer_id.to_string();
        self.do_transition(NegotiationState::Agreed, &consumer, None);
        Ok(())
    }

    /// Provider verifies the agreement request (AGREED → VERIFIED).
    pub fn verify(&mut self) -> Result<(), NegotiationError> {
        self.state.permits(NegotiationAction::Verify)?;
        self.do_transition(NegotiationState::Verified, SYSTEM_ACTOR, None);
        Ok(())
    }

    /// Issue the agreement and close the negotiation (VERIFIED → FINALIZED).
    ///
    /// The guard runs before issuance, so a negotiation yields at most one
    /// agreement no matter how often this is called.
    pub fn finalize(&mut self, policy_description: String) -> Result<Agreement, NegotiationError> {
        self.state.permits(NegotiationAction::Finalize)?;
        let agreement = Agreement::issue(self, policy_description);
        self.agreement_id = Some(agreement.id);
        self.do_transition(
            NegotiationState::Finalized,
            SYSTEM_ACTOR,
            Some(format!("issued {}", agreement.id)),
        );
        Ok(agreement)
    }

    /// Cancel from any non-terminal state.
    pub fn terminate(&mut self, actor: &str, reason: &str) -> Result<(), NegotiationError> {
        self.state.permits(NegotiationAction::Terminate)?;
        self.do_transition(NegotiationState::Terminated, actor, Some(reason.to_string()));
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the negotiation ended because the policy refused the consumer.
    pub fn denied_by_policy(&self) -> bool {
        self.state == NegotiationState::Terminated
            && self
                .policy_evaluation
                .as_ref()
                .is_some_and(|decision| !decision.allowed)
    }

    fn do_transition(&mut self, to: NegotiationState, actor: &str, detail: Option<String>) {
        self.updated_at = append(&mut self.history, to, Some(actor), detail);
        self.state = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
