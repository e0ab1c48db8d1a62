//! # Status, Audit, and Reset Routes (provider)
//!
//! - `GET  /v1/status`   — participant id and record counts
//! - `GET  /v1/audit`    — audit events, oldest first (`?limit=`, `?event_type=`)
//! - `POST /v1/reset`    — drop all negotiations, agreements, transfers, and audit events

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use dsc_connector::{AuditEvent, AuditEventType, AuditLog, ConnectorStatistics};
use dsc_core::ParticipantId;
use serde::{Deserialize, Serialize};

use crate::state::ProviderState;

pub fn router() -> Router<ProviderState> {
    Router::new()
        .route("/v1/status", get(status))
        .route("/v1/audit", get(audit))
        .route("/v1/reset", post(reset))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub role: String,
    pub participant_id: ParticipantId,
    pub version: String,
    pub statistics: ConnectorStatistics,
}

/// Filters for `GET /v1/audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// Return only the most recent `limit` matching events.
    pub limit: Option<usize>,
    pub event_type: Option<AuditEventType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
}

async fn status(State(state): State<ProviderState>) -> Json<ProviderStatus> {
    Json(ProviderStatus {
        role: "provider".to_string(),
        participant_id: state.connector.participant_id().clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        statistics: state.connector.statistics(),
    })
}

async fn audit(
    State(state): State<ProviderState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEvent>> {
    Json(query_audit(&state.audit, &query))
}

async fn reset(State(state): State<ProviderState>) -> Json<ResetResponse> {
    state.connector.reset();
    state.audit.clear();
    Json(ResetResponse {
        status: "reset".to_string(),
    })
}

/// Apply [`AuditQuery`] filters to a log. Shared with the consumer routes.
pub(crate) fn query_audit(log: &AuditLog, query: &AuditQuery) -> Vec<AuditEvent> {
    let mut events = match query.event_type {
        Some(event_type) => log.entries_by_type(event_type),
        None => log.entries(),
    };
    if let Some(limit) = query.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsc_connector::AuditSink;
    use serde_json::json;

    fn log() -> AuditLog {
        let log = AuditLog::default();
        log.record(AuditEventType::NegotiationInitiated, json!({ "n": 1 }));
        log.record(AuditEventType::NegotiationOffered, json!({ "n": 2 }));
        log.record(AuditEventType::NegotiationInitiated, json!({ "n": 3 }));
        log
    }

    #[test]
    fn limit_keeps_most_recent() {
        let events = query_audit(
            &log(),
            &AuditQuery {
                limit: Some(2),
                event_type: None,
            },
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details["n"], 2);
        assert_eq!(events[1].details["n"], 3);
    }

    #[test]
    fn event_type_filters() {
        let events = query_audit(
            &log(),
            &AuditQuery {
                limit: None,
                event_type: Some(AuditEventType::NegotiationInitiated),
            },
        );
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.event_type == AuditEventType::NegotiationInitiated));
    }
}
