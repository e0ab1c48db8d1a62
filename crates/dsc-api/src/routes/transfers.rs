//! # Transfer Routes (provider)
//!
//! - `GET  /v1/transfers`                      — all transfers
//! - `POST /v1/transfers`                      — open a transfer under an agreement (201)
//! - `GET  /v1/transfers/{id}`
//! - `POST /v1/transfers/{id}/start`
//! - `POST /v1/transfers/{id}/complete`        — attach the asset payload
//! - `POST /v1/transfers/{id}/suspend`
//! - `POST /v1/transfers/{id}/terminate`
//! - `GET  /v1/transfers/{id}/data`            — payload of a completed transfer

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dsc_connector::{CreateTransferRequest, ReasonRequest, TransferData};
use dsc_core::TransferId;
use dsc_state::Transfer;

use crate::error::AppError;
use crate::extractors::{extract_json, optional_json, IdPath};
use crate::state::ProviderState;

pub fn router() -> Router<ProviderState> {
    Router::new()
        .route("/v1/transfers", get(list_transfers).post(create_transfer))
        .route("/v1/transfers/{id}", get(get_transfer))
        .route("/v1/transfers/{id}/start", post(start))
        .route("/v1/transfers/{id}/complete", post(complete))
        .route("/v1/transfers/{id}/suspend", post(suspend))
        .route("/v1/transfers/{id}/terminate", post(terminate))
        .route("/v1/transfers/{id}/data", get(data))
}

async fn list_transfers(State(state): State<ProviderState>) -> Json<Vec<Transfer>> {
    Json(state.connector.transfers())
}

async fn create_transfer(
    State(state): State<ProviderState>,
    body: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transfer>), AppError> {
    let request = extract_json(body)?;
    let transfer = state
        .connector
        .create_transfer(request.agreement_id, request.options)?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

async fn get_transfer(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Transfer>, AppError> {
    Ok(Json(state.connector.transfer(TransferId(id))?))
}

async fn start(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Transfer>, AppError> {
    Ok(Json(state.connector.start_transfer(TransferId(id))?))
}

async fn complete(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<Transfer>, AppError> {
    Ok(Json(state.connector.complete_transfer(TransferId(id))?))
}

async fn suspend(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Transfer>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .suspend_transfer(TransferId(id), request.reason)?,
    ))
}

async fn terminate(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
    body: Bytes,
) -> Result<Json<Transfer>, AppError> {
    let request: ReasonRequest = optional_json(&body)?;
    Ok(Json(
        state
            .connector
            .terminate_transfer(TransferId(id), request.reason)?,
    ))
}

async fn data(
    State(state): State<ProviderState>,
    IdPath(id): IdPath,
) -> Result<Json<TransferData>, AppError> {
    Ok(Json(state.connector.transfer_data(TransferId(id))?))
}
