//! # dsc-state — Negotiation and Transfer State Machines
//!
//! Enum-based state machines with runtime transition guards. Each entity
//! carries its own append-only history; every successful transition appends
//! exactly one entry and a rejected transition leaves the entity untouched.
//!
//! ## Negotiation
//!
//! ```text
//! REQUESTED ──▶ OFFERED ──▶ AGREED ──▶ VERIFIED ──▶ FINALIZED (terminal)
//!     │            │           │           │
//!     └────────────┴───────────┴───────────┴──▶ TERMINATED (terminal)
//! ```
//!
//! `offer` consults the policy evaluator; a denial moves straight to
//! TERMINATED. `finalize` issues the single [`Agreement`] for the
//! negotiation.
//!
//! ## Transfer
//!
//! ```text
//! REQUESTED ──▶ STARTED ──▶ COMPLETED (terminal)
//!     │            │
//!     │            └──▶ SUSPENDED
//!     │                    │
//!     └──────────┴─────────┴──▶ TERMINATED (terminal)
//! ```
//!
//! A transfer can only be requested against an ACTIVE agreement.

pub mod agreement;
pub mod history;
pub mod negotiation;
pub mod transfer;

pub use agreement::{Agreement, AgreementError, AgreementStatus};
pub use history::HistoryEntry;
pub use negotiation::{
    Negotiation, NegotiationAction, NegotiationError, NegotiationHistoryEntry, NegotiationRequest,
    NegotiationState, SYSTEM_ACTOR,
};
pub use transfer::{
    Transfer, TransferAction, TransferError, TransferHistoryEntry, TransferOptions, TransferState,
    DEFAULT_TRANSFER_FORMAT,
};
