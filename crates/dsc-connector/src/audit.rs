//! # Audit Sink
//!
//! Fire-and-forget record of connector events. Recording never fails and
//! never blocks a transition: sinks swallow their own problems.
//!
//! [`AuditLog`] is the in-memory sink. It is bounded; when the configured
//! maximum is exceeded the oldest 10% of entries are trimmed.

use std::collections::VecDeque;

use dsc_core::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AuditEventType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    NegotiationInitiated,
    NegotiationOffered,
    NegotiationAgreed,
    NegotiationVerified,
    NegotiationFinalized,
    NegotiationTerminated,
    AgreementTerminated,
    TransferInitiated,
    TransferStarted,
    TransferCompleted,
    TransferSuspended,
    TransferTerminated,
    DataAccessed,
    IdentityUpdated,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegotiationInitiated => "NEGOTIATION_INITIATED",
            Self::NegotiationOffered => "NEGOTIATION_OFFERED",
            Self::NegotiationAgreed => "NEGOTIATION_AGREED",
            Self::NegotiationVerified => "NEGOTIATION_VERIFIED",
            Self::NegotiationFinalized => "NEGOTIATION_FINALIZED",
            Self::NegotiationTerminated => "NEGOTIATION_TERMINATED",
            Self::AgreementTerminated => "AGREEMENT_TERMINATED",
            Self::TransferInitiated => "TRANSFER_INITIATED",
            Self::TransferStarted => "TRANSFER_STARTED",
            Self::TransferCompleted => "TRANSFER_COMPLETED",
            Self::TransferSuspended => "TRANSFER_SUSPENDED",
            Self::TransferTerminated => "TRANSFER_TERMINATED",
            Self::DataAccessed => "DATA_ACCESSED",
            Self::IdentityUpdated => "IDENTITY_UPDATED",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditEvent / AuditSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub timestamp: Timestamp,
    pub details: serde_json::Value,
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event_type: AuditEventType, details: serde_json::Value);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn record(&self, _event_type: AuditEventType, _details: serde_json::Value) {}
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Default capacity of [`AuditLog`].
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Bounded in-memory audit log.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEvent>>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEvent> {
        self.entries.lock().iter().cloned().collect()
    }

    /// The most recent `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<AuditEvent> {
        let entries = self.entries.lock();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    pub fn entries_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event_type: AuditEventType, details: serde_json::Value) {
        tracing::debug!(event = %event_type, "audit");
        let mut entries = self.entries.lock();
        entries.push_back(AuditEvent {
            event_type,
            timestamp: Timestamp::now(),
            details,
        });
        if entries.len() > self.max_entries {
            let trim = (self.max_entries / 10).max(1);
            entries.drain(..trim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_query() {
        let log = AuditLog::default();
        log.record(AuditEventType::NegotiationInitiated, json!({"asset_id": "a"}));
        log.record(AuditEventType::TransferStarted, json!({}));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries_by_type(AuditEventType::TransferStarted).len(), 1);
        assert_eq!(log.last_n(1)[0].event_type, AuditEventType::TransferStarted);
        assert_eq!(log.entries()[0].details["asset_id"], "a");
    }

    #[test]
    fn test_trims_oldest_tenth_when_full() {
        let log = AuditLog::new(20);
        for i in 0..21 {
            log.record(AuditEventType::DataAccessed, json!({ "i": i }));
        }
        assert_eq!(log.len(), 19);
        assert_eq!(log.entries()[0].details["i"], 2);
    }

    #[test]
    fn test_event_type_wire_name() {
        assert_eq!(
            serde_json::to_value(AuditEventType::NegotiationFinalized).unwrap(),
            json!(AuditEventType::NegotiationFinalized.as_str())
        );
    }

    #[test]
    fn test_null_sink_accepts_events() {
        NullAudit.record(AuditEventType::DataAccessed, json!(null));
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::new(5);
        log.record(AuditEventType::DataAccessed, json!({}));
        log.clear();
        assert!(log.is_empty());
    }
}
