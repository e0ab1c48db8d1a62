//! # Transfer Process State Machine
//!
//! ```text
//! REQUESTED ──▶ STARTED ──▶ COMPLETED (terminal)
//!     │            │
//!     │            └──▶ SUSPENDED
//!     │                    │
//!     └──────────┴─────────┴──▶ TERMINATED (terminal)
//! ```
//!
//! `data` is attached by `complete` and is present iff the state is
//! COMPLETED. Loading the payload is the caller's job: check
//! [`TransferState::permits`] with [`TransferAction::Complete`], fetch the
//! asset data, then call [`Transfer::complete`].

use dsc_core::{AgreementId, AssetId, ParticipantId, Timestamp, TransferId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agreement::{Agreement, AgreementStatus};
use crate::history::{append, HistoryEntry};

/// Delivery format used when the consumer does not ask for one.
pub const DEFAULT_TRANSFER_FORMAT: &str = "HTTP_PUSH";

// ─── Transfer State ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Requested,
    Started,
    Suspended,
    /// Data delivered (terminal).
    Completed,
    /// Cancelled (terminal).
    Terminated,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    /// Check whether `action` may run from this state.
    pub fn permits(&self, action: TransferAction) -> Result<(), TransferError> {
        let allowed = match action.required_state() {
            Some(required) => *self == required,
            None => !self.is_terminal(),
        };
        if allowed {
            Ok(())
        } else {
            Err(TransferError::InvalidTransition {
                action,
                current: *self,
                expected: action.expected(),
            })
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "REQUESTED",
            Self::Started => "STARTED",
            Self::Suspended => "SUSPENDED",
            Self::Completed => "COMPLETED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    Start,
    Complete,
    Suspend,
    Terminate,
}

impl TransferAction {
    /// The single state this action runs from; `None` means any non-terminal state.
    pub fn required_state(&self) -> Option<TransferState> {
        match self {
            Self::Start => Some(TransferState::Requested),
            Self::Complete | Self::Suspend => Some(TransferState::Started),
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
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Suspend => "suspend",
            Self::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for TransferAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("cannot {action} transfer in state {current}; expected {expected}")]
    InvalidTransition {
        action: TransferAction,
        current: TransferState,
        expected: String,
    },

    /// Transfers can only be opened against an ACTIVE agreement.
    #[error("{agreement_id} is not active (status {status})")]
    AgreementNotActive {
        agreement_id: AgreementId,
        status: AgreementStatus,
    },
}

// ─── Transfer ────────────────────────────────────────────────────────

/// Consumer-chosen delivery parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferOptions {
    #[serde(default)]
    pub data_destination: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

pub type TransferHistoryEntry = HistoryEntry<TransferState>;

/// A data transfer executed under an agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub agreement_id: AgreementId,
    pub asset_id: AssetId,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub state: TransferState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_destination: Option<String>,
    pub format: String,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Delivered payload; present iff COMPLETED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub history: Vec<TransferHistoryEntry>,
}

impl Transfer {
    /// Open a transfer in REQUESTED against an ACTIVE agreement.
    pub fn request(agreement: &Agreement, options: TransferOptions) -> Result<Self, TransferError> {
        if !agreement.is_active() {
            return Err(TransferError::AgreementNotActive {
                agreement_id: agreement.id,
                status: agreement.status,
            });
        }
        let mut history = Vec::new();
        let now = append(
            &mut history,
            TransferState::Requested,
            Some(agreement.consumer_id.as_str()),
            None,
        );
        Ok(Self {
            id: TransferId::new(),
            agreement_id: agreement.id,
            asset_id: agreement.asset_id.clone(),
            provider_id: agreement.provider_id.clone(),
            consumer_id: agreement.consumer_id.clone(),
            state: TransferState::Requested,
            data_destination: options.data_destination,
            format: options
                .format
                .unwrap_or_else(|| DEFAULT_TRANSFER_FORMAT.to_string()),
            created_at: now,
            started_at: None,
            completed_at: None,
            data: None,
            history,
        })
    }

    /// REQUESTED → STARTED.
    pub fn start(&mut self) -> Result<(), TransferError> {
        self.state.permits(TransferAction::Start)?;
        let at = self.do_transition(TransferState::Started, None);
        self.started_at = Some(at);
        Ok(())
    }

    /// Attach the payload (STARTED → COMPLETED).
    pub fn complete(&mut self, data: serde_json::Value) -> Result<(), TransferError> {
        self.state.permits(TransferAction::Complete)?;
        let size = data.to_string().len();
        let at = self.do_transition(TransferState::Completed, Some(format!("delivered {size} bytes")));
        self.completed_at = Some(at);
        self.data = Some(data);
        Ok(())
    }

    /// STARTED → SUSPENDED.
    pub fn suspend(&mut self, reason: Option<String>) -> Result<(), TransferError> {
        self.state.permits(TransferAction::Suspend)?;
        self.do_transition(TransferState::Suspended, reason);
        Ok(())
    }

    /// REQUESTED | STARTED | SUSPENDED → TERMINATED.
    pub fn terminate(&mut self, reason: Option<String>) -> Result<(), TransferError> {
        self.state.permits(TransferAction::Terminate)?;
        self.do_transition(TransferState::Terminated, reason);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn do_transition(&mut self, to: TransferState, detail: Option<String>) -> Timestamp {
        let at = append(&mut self.history, to, None, detail);
        self.state = to;
        at
    }
}
