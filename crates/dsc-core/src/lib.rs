//! # dsc-core — Foundational Types for the Dataspace Connector
//!
//! Every other crate in the workspace depends on `dsc-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `NegotiationId`, `AgreementId`,
//!    `TransferId`, `AssetId`, `ParticipantId`, `PolicyKey`. You cannot pass
//!    a transfer id where an agreement id is expected.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is always UTC, millisecond
//!    precision, and renders with a `Z` suffix.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dsc-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::DscError;
pub use identity::{AgreementId, AssetId, NegotiationId, ParticipantId, PolicyKey, TransferId};
pub use temporal::Timestamp;
