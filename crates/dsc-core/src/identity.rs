//! # Identity Types
//!
//! Newtype wrappers for every identifier the connector hands out or accepts.
//! Negotiations, agreements, and transfers get random UUIDs minted by the
//! provider. Assets, participants, and policy keys are human-chosen strings
//! and are validated to be non-empty when constructed or deserialized.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DscError;

/// Unique identifier for a contract negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NegotiationId(pub Uuid);

/// Unique identifier for a signed agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgreementId(pub Uuid);

/// Unique identifier for a data transfer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub Uuid);

impl NegotiationId {
    /// Generate a new random negotiation identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AgreementId {
    /// Generate a new random agreement identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TransferId {
    /// Generate a new random transfer identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NegotiationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for NegotiationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for AgreementId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for TransferId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "negotiation:{}", self.0)
    }
}

impl std::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agreement:{}", self.0)
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer:{}", self.0)
    }
}

// ─── String identifiers ──────────────────────────────────────────────

/// Catalog identifier of a data asset (e.g. `part-catalog-2024`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

/// Identifier of a dataspace participant (provider or consumer connector).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

/// Short key under which a policy is registered (e.g. `tier1-only`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyKey(String);

fn non_empty(kind: &str, value: String) -> Result<String, DscError> {
    if value.trim().is_empty() {
        return Err(DscError::InvalidIdentifier(format!("{kind} must not be empty")));
    }
    Ok(value)
}

impl AssetId {
    /// Create an asset id, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, DscError> {
        non_empty("asset id", value.into()).map(Self)
    }

    /// Wrap a compile-time literal. Literals in this workspace are non-empty.
    pub fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ParticipantId {
    /// Create a participant id, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, DscError> {
        non_empty("participant id", value.into()).map(Self)
    }

    /// Wrap a compile-time literal. Literals in this workspace are non-empty.
    pub fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PolicyKey {
    /// Create a policy key, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, DscError> {
        non_empty("policy key", value.into()).map(Self)
    }

    /// Wrap a compile-time literal. Literals in this workspace are non-empty.
    pub fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetId {
    type Error = DscError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = DscError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for PolicyKey {
    type Error = DscError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl From<PolicyKey> for String {
    fn from(key: PolicyKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
