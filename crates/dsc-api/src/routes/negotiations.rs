//! # Negotiation and Agreement Routes (provider)
//!
//! - `GET  /v1/negotiations`                   — all negotiations, oldest first
//! - `POST /v1/negotiations`                   — open a negotiation (201)
//! - `GET  /v1/negotiations/{id}`              — one negotiation
//! - `GET  /v1/negotiations/{id}/history`      — its transition history
//! - `POST /v1/negotiations/{id}/offer`        — evaluate the policy
//! - `POST /v1/negotiations/{id}/agree`
//! - `POST /v1/negotiations/{id}/verify`
//! - `POST /v1/negotiations/{id}/finalize`     — issue the agreement
//! - `POST /v1/negotiations/{id}/terminate`
//! - `GET  /v1/agreements`
//! - `GET  /v1/agreements/{id}`
//! - `POST /v1/agreements/{id}/terminate`
//!
//! A policy denial on `offer` is a successful call: the negotiation comes
//! back TERMINATED with the decision attached.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dsc_connector::{CreateNegotiationRequest, FinalizeResponse, OfferRequest, ReasonRequest};
use dsc_core::{AgreementId, NegotiationId};
use dsc_state::{Agreement, Negotiation, NegotiationHistoryEntry};

use crate::error::AppError;
use crate::extractors::{extract_json, optional_json, IdPath};
use crate::state::ProviderState;

pub fn router() -> Router<ProviderState> {
    Router::new()
        .route(
            "/v1/negotiations",
            get(list_negotiations).post(create_negotiation),
        )
        .route("/v1/negotiations/{id}", get(get_negotiation))
        .route("/v1/negotiations/{id}/history", get(history))
        .route("/v1/negotiations/{id}/offer", post(offer))
        .route("/v1/negotiations/{id}/agree", post(agree))
        .route("/v1/negotiations/{id}/verify", post(verify))
        .route("/v1/negotiations/{id}/finalize", post(finalize))
        .route("/v1/negotiations/{id}/terminate", post(terminate))
        .route("/v1/agreements", get(list_agreements))
        .route("/v1/agreements/{id}", get(get_agreement))
        .route("/v1/agreements/{id}/terminate", post(terminate_agreement))
}

async fn list_negotiations(State(state): State<ProviderState>) -> Json<Vec<Negotiation>> {
    Json(state.connector.negotiations())
}

async fn create_negotiation(
    State(state): State<ProviderState>,
    body: Result<Json<CreateNegotiationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Negotiation>), AppError> {
    let request = extract_json(body)?;
    let negotiation = state.connector.create_negotiation(request)?;
    Ok((StatusCode::CREATED, Json(negotiation)))
}

async fn get_negotiation(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Negotiation>, AppError> {
    Ok(Json(state.connector.negotiation(NegotiationId(id))?))
}

async fn history(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Vec<NegotiationHistoryEntry>>, AppError> {
    Ok(Json(state.connector.negotiation_history(NegotiationId(id))?))
}

async fn offer(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Negotiation>, AppError> {
    let request: OfferRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .offer(NegotiationId(id), request.consumer_attributes)?,
    ))
}

async fn agree(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Negotiation>, AppError> {
    Ok(Json(state.connector.agree(NegotiationId(id))?))
}

async fn verify(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Negotiation>, AppError> {
    Ok(Json(state.connector.verify(NegotiationId(id))?))
}

async fn finalize(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (negotiation, agreement) = state.connector.finalize(NegotiationId(id))?;
    Ok(Json(FinalizeResponse {
        negotiation,
        agreement,
    }))
}

async fn terminate(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Negotiation>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .terminate_negotiation(NegotiationId(id), request.reason)?,
    ))
}

async fn list_agreements(State(state): State<ProviderState>) -> Json<Vec<Agreement>> {
    Json(state.connector.agreements())
}

async fn get_agreement(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Agreement>, AppError> {
    Ok(Json(state.connector.agreement(AgreementId(id))?))
}

async fn terminate_agreement(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Agreement>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .terminate_agreement(AgreementId(id), request.reason)?,
    ))
}
