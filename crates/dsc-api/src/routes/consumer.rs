//! # Consumer Routes
//!
//! The consumer mirrors provider records. Every mutating route runs one
//! saga step against the provider and returns the mirrored record with its
//! `sync_status`. A failed provider call leaves the mirror's state as it
//! was and marks the record UNCONFIRMED; `refresh` reconciles it.
//!
//! - `GET  /v1/identity`, `PUT /v1/identity`
//! - `GET  /v1/catalog`                        — fetch from the provider and cache
//! - `GET  /v1/catalog/cached`
//! - `POST /v1/negotiate`                      — full handshake for one asset
//! - `GET  /v1/negotiations`, `POST /v1/negotiations`
//! - `GET  /v1/negotiations/{id}`, `GET /v1/negotiations/{id}/history`
//! - `POST /v1/negotiations/{id}/{offer|agree|verify|finalize|terminate|refresh}`
//! - `GET  /v1/agreements`, `GET /v1/agreements/{id}`
//! - `GET  /v1/transfers`, `POST /v1/transfers`
//! - `GET  /v1/transfers/{id}`, `GET /v1/transfers/{id}/data`
//! - `POST /v1/transfers/{id}/{start|complete|suspend|terminate|refresh}`
//! - `GET  /v1/status`, `GET /v1/audit`, `POST /v1/reset`

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dsc_connector::{
    AuditEvent, ConsumerIdentity, CreateTransferRequest, Dataset, IdentityOverride, Mirrored,
    PeerConnector, ReasonRequest, SyncStatus,
};
use dsc_core::{AgreementId, AssetId, NegotiationId, ParticipantId, TransferId};
use dsc_state::{Agreement, Negotiation, NegotiationHistoryEntry, Transfer};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_json, optional_json, IdPath};
use crate::routes::admin::{query_audit, AuditQuery, ResetResponse};
use crate::state::ConsumerState;

pub fn router() -> Router<ConsumerState> {
    Router::new()
        .route("/v1/identity", get(get_identity).put(update_identity))
        .route("/v1/catalog", get(fetch_catalog))
        .route("/v1/catalog/cached", get(cached_catalog))
        .route("/v1/negotiate", post(negotiate))
        .route(
            "/v1/negotiations",
            get(list_negotiations).post(initiate_negotiation),
        )
        .route("/v1/negotiations/{id}", get(get_negotiation))
        .route("/v1/negotiations/{id}/history", get(negotiation_history))
        .route("/v1/negotiations/{id}/offer", post(request_offer))
        .route("/v1/negotiations/{id}/agree", post(agree))
        .route("/v1/negotiations/{id}/verify", post(verify))
        .route("/v1/negotiations/{id}/finalize", post(finalize))
        .route("/v1/negotiations/{id}/terminate", post(terminate_negotiation))
        .route("/v1/negotiations/{id}/refresh", post(refresh_negotiation))
        .route("/v1/agreements", get(list_agreements))
        .route("/v1/agreements/{id}", get(get_agreement))
        .route(
            "/v1/transfers",
            get(list_transfers).post(initiate_transfer),
        )
        .route("/v1/transfers/{id}", get(get_transfer))
        .route("/v1/transfers/{id}/data", get(received_data))
        .route("/v1/transfers/{id}/start", post(start_transfer))
        .route("/v1/transfers/{id}/complete", post(complete_transfer))
        .route("/v1/transfers/{id}/suspend", post(suspend_transfer))
        .route("/v1/transfers/{id}/terminate", post(terminate_transfer))
        .route("/v1/transfers/{id}/refresh", post(refresh_transfer))
        .route("/v1/status", get(status))
        .route("/v1/audit", get(audit))
        .route("/v1/reset", post(reset))
}

// -- Request/response types ---------------------------------------------------

/// Body of `POST /v1/negotiations` and `POST /v1/negotiate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct NegotiateRequest {
    pub asset_id: AssetId,
}

/// A finalized negotiation with the agreement it produced.
#[derive(Debug, Serialize, Deserialize)]
pub struct NegotiatedAgreement {
    pub negotiation: Mirrored<Negotiation>,
    pub agreement: Agreement,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumerStatus {
    pub role: String,
    pub consumer_id: ParticipantId,
    pub provider_endpoint: String,
    pub version: String,
    pub negotiations: usize,
    pub agreements: usize,
    pub transfers: usize,
    /// Records whose last provider call failed.
    pub unconfirmed: usize,
}

// -- Identity and catalog -----------------------------------------------------

async fn get_identity(State(state): State<ConsumerState>) -> Json<ConsumerIdentity> {
    Json(state.connector.identity())
}

async fn update_identity(
    State(state): State<ConsumerState>,
    body: Result<Json<IdentityOverride>, JsonRejection>,
) -> Result<Json<ConsumerIdentity>, AppError> {
    let changes = extract_json(body)?;
    Ok(Json(state.connector.update_identity(&changes)))
}

async fn fetch_catalog(State(state): State<ConsumerState>) -> Result<Json<Vec<Dataset>>, AppError> {
    Ok(Json(state.connector.browse_catalog().await?))
}

async fn cached_catalog(State(state): State<ConsumerState>) -> Result<Json<Vec<Dataset>>, AppError> {
    state
        .connector
        .cached_catalog()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("catalog has not been fetched yet".to_string()))
}

// -- Negotiations -------------------------------------------------------------

async fn negotiate(
    State(state): State<ConsumerState>,
    body: Result<Json<NegotiateRequest>, JsonRejection>,
) -> Result<Json<NegotiatedAgreement>, AppError> {
    let request = extract_json(body)?;
    let (negotiation, agreement) = state.connector.negotiate(request.asset_id).await?;
    Ok(Json(NegotiatedAgreement {
        negotiation,
        agreement,
    }))
}

async fn list_negotiations(State(state): State<ConsumerState>) -> Json<Vec<Mirrored<Negotiation>>> {
    Json(state.connector.negotiations())
}

async fn initiate_negotiation(
    State(state): State<ConsumerState>,
    body: Result<Json<NegotiateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Mirrored<Negotiation>>), AppError> {
    let request = extract_json(body)?;
    let mirror = state.connector.initiate_negotiation(request.asset_id).await?;
    Ok((StatusCode::CREATED, Json(mirror)))
}

async fn get_negotiation(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    Ok(Json(state.connector.negotiation(NegotiationId(id))?))
}

async fn negotiation_history(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Vec<NegotiationHistoryEntry>>, AppError> {
    Ok(Json(state.connector.negotiation(NegotiationId(id))?.record.history))
}

async fn request_offer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    let changes: Option<IdentityOverride> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(optional_json(&body)?)
    };
    Ok(Json(
        state
            .connector
            .request_offer(NegotiationId(id), changes)
            .await?,
    ))
}

async fn agree(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    Ok(Json(state.connector.agree(NegotiationId(id)).await?))
}

async fn verify(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    Ok(Json(state.connector.verify(NegotiationId(id)).await?))
}

async fn finalize(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<NegotiatedAgreement>, AppError> {
    let (negotiation, agreement) = state.connector.finalize(NegotiationId(id)).await?;
    Ok(Json(NegotiatedAgreement {
        negotiation,
        agreement,
    }))
}

async fn terminate_negotiation(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .terminate_negotiation(NegotiationId(id), request.reason)
            .await?,
    ))
}

async fn refresh_negotiation(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Negotiation>>, AppError> {
    Ok(Json(
        state
            .connector
            .refresh_negotiation(NegotiationId(id))
            .await?,
    ))
}

// -- Agreements ---------------------------------------------------------------

async fn list_agreements(State(state): State<ConsumerState>) -> Json<Vec<Agreement>> {
    Json(state.connector.agreements())
}

async fn get_agreement(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Agreement>, AppError> {
    Ok(Json(state.connector.agreement(AgreementId(id))?))
}

// -- Transfers ----------------------------------------------------------------

async fn list_transfers(State(state): State<ConsumerState>) -> Json<Vec<Mirrored<Transfer>>> {
    Json(state.connector.transfers())
}

async fn initiate_transfer(
    State(state): State<ConsumerState>,
    body: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Mirrored<Transfer>>), AppError> {
    let request = extract_json(body)?;
    let mirror = state
        .connector
        .initiate_transfer(request.agreement_id, request.options)
        .await?;
    Ok((StatusCode::CREATED, Json(mirror)))
}

async fn get_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    Ok(Json(state.connector.transfer(TransferId(id))?))
}

async fn received_data(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(state.connector.received_data(TransferId(id))?))
}

async fn start_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    Ok(Json(state.connector.start_transfer(TransferId(id)).await?))
}

async fn complete_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    Ok(Json(state.connector.complete_transfer(TransferId(id)).await?))
}

async fn suspend_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .suspend_transfer(TransferId(id), request.reason)
            .await?,
    ))
}

async fn terminate_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .terminate_transfer(TransferId(id), request.reason)
            .await?,
    ))
}

async fn refresh_transfer(
    State(state): State<ConsumerState>,
    IdPath(id): IdPath,
) -> Result<Json<Mirrored<Transfer>>, AppError> {
    Ok(Json(state.connector.refresh_transfer(TransferId(id)).await?))
}

// -- Housekeeping -------------------------------------------------------------

async fn status(State(state): State<ConsumerState>) -> Json<ConsumerStatus> {
    let connector = &state.connector;
    let negotiations = connector.negotiations();
    let transfers = connector.transfers();
    let unconfirmed = negotiations
        .iter()
        .filter(|n| n.sync_status == SyncStatus::Unconfirmed)
        .count()
        + transfers
            .iter()
            .filter(|t| t.sync_status == SyncStatus::Unconfirmed)
            .count();
    Json(ConsumerStatus {
        role: "consumer".to_string(),
        consumer_id: connector.identity().consumer_id,
        provider_endpoint: connector.peer().endpoint(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        negotiations: negotiations.len(),
        agreements: connector.agreements().len(),
        transfers: transfers.len(),
        unconfirmed,
    })
}

async fn audit(
    State(state): State<ConsumerState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEvent>> {
    Json(query_audit(&state.audit, &query))
}

async fn reset(State(state): State<ConsumerState>) -> Json<ResetResponse> {
    state.connector.reset();
    state.audit.clear();
    Json(ResetResponse {
        status: "reset".to_string(),
    })
}
