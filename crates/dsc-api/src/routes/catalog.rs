//! # Catalog and Policy Routes
//!
//! - `GET /v1/catalog`                         — published datasets
//! - `GET /v1/catalog/datasets/{asset_id}`     — one dataset
//! - `GET /v1/catalog/preview/{asset_id}`      — first-level payload summary
//! - `GET /v1/policies`                        — registered policies
//! - `GET /v1/policies/{key}`                  — one policy

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use dsc_connector::{AssetPreview, ConnectorError, Dataset};
use dsc_core::{AssetId, PolicyKey};
use dsc_policy::{describe, Policy};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::ProviderState;

pub fn router() -> Router<ProviderState> {
    Router::new()
        .route("/v1/catalog", get(list_datasets))
        .route("/v1/catalog/datasets/{asset_id}", get(get_dataset))
        .route("/v1/catalog/preview/{asset_id}", get(preview))
        .route("/v1/policies", get(list_policies))
        .route("/v1/policies/{key}", get(get_policy))
}

/// A registered policy with its human-readable summary.
#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub key: PolicyKey,
    pub description: String,
    pub policy: Policy,
}

impl PolicyEntry {
    fn new(key: &PolicyKey, policy: &Policy) -> Self {
        Self {
            key: key.clone(),
            description: describe(policy),
            policy: policy.clone(),
        }
    }
}

async fn list_datasets(State(state): State<ProviderState>) -> Result<Json<Vec<Dataset>>, AppError> {
    Ok(Json(state.connector.catalog()?))
}

async fn get_dataset(
    State(state): State<ProviderState>,
    Path(asset_id): Path<String>,
) -> Result<Json<Dataset>, AppError> {
    let asset_id = AssetId::new(asset_id)?;
    Ok(Json(state.connector.dataset(&asset_id)?))
}

async fn preview(
    State(state): State<ProviderState>,
    Path(asset_id): Path<String>,
) -> Result<Json<AssetPreview>, AppError> {
    let asset_id = AssetId::new(asset_id)?;
    Ok(Json(state.connector.preview(&asset_id)?))
}

async fn list_policies(State(state): State<ProviderState>) -> Json<Vec<PolicyEntry>> {
    Json(
        state
            .connector
            .policies()
            .list()
            .map(|(key, policy)| PolicyEntry::new(key, policy))
            .collect(),
    )
}

async fn get_policy(
    State(state): State<ProviderState>,
    Path(key): Path<String>,
) -> Result<Json<PolicyEntry>, AppError> {
    let key = PolicyKey::new(key)?;
    let policy = state
        .connector
        .policies()
        .get(&key)
        .ok_or_else(|| ConnectorError::PolicyNotFound(key.clone()))?;
    Ok(Json(PolicyEntry::new(&key, policy)))
}
