//! Append-only transition history shared by both state machines.

use dsc_core::Timestamp;
use serde::{Deserialize, Serialize};

/// One entry in an entity's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry<S> {
    /// State entered by this transition.
    pub state: S,
    pub timestamp: Timestamp,
    /// Participant or subsystem that caused the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append an entry whose timestamp is never earlier than the previous one.
pub(crate) fn append<S>(
    history: &mut Vec<HistoryEntry<S>>,
    state: S,
    actor: Option<&str>,
    detail: Option<String>,
) -> Timestamp {
    let timestamp = Timestamp::not_before(history.last().map(|e| e.timestamp));
    history.push(HistoryEntry {
        state,
        timestamp,
        actor: actor.map(str::to_string),
        detail,
    });
    timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_is_monotonic() {
        let mut history: Vec<HistoryEntry<u8>> = Vec::new();
        for i in 0..50 {
            append(&mut history, i, Some("tester"), None);
        }
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(history.len(), 50);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let mut history: Vec<HistoryEntry<&str>> = Vec::new();
        append(&mut history, "STARTED", None, None);
        let json = serde_json::to_value(&history[0]).unwrap();
        assert!(json.get("actor").is_none());
        assert!(json.get("detail").is_none());
    }
}
