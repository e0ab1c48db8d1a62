//! # dsc-api — HTTP Service for the Dataspace Connector
//!
//! One process plays one role. The provider serves the authoritative
//! negotiation, agreement, and transfer records; the consumer mirrors them
//! through a peer connection and exposes the same resource paths plus its
//! identity and the one-call `negotiate` handshake.
//!
//! ## API Surface
//!
//! | Prefix                | Provider                    | Consumer                       |
//! |-----------------------|-----------------------------|--------------------------------|
//! | `/v1/catalog*`        | [`routes::catalog`]         | [`routes::consumer`] (fetch/cache) |
//! | `/v1/policies*`       | [`routes::catalog`]         | —                              |
//! | `/v1/negotiations*`   | [`routes::negotiations`]    | [`routes::consumer`] (mirror)  |
//! | `/v1/agreements*`     | [`routes::negotiations`]    | [`routes::consumer`]           |
//! | `/v1/transfers*`      | [`routes::transfers`]       | [`routes::consumer`] (mirror)  |
//! | `/v1/identity`        | —                           | [`routes::consumer`]           |
//! | `/v1/status`, `/v1/audit`, `/v1/reset` | [`routes::admin`] | [`routes::consumer`]   |
//!
//! Health probes and `/metrics` are mounted for both roles.
//!
//! ## Middleware Stack
//!
//! ```text
//! CorsLayer → TraceLayer → DefaultBodyLimit → Handler
//! ```

pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, RoleState};

/// Request body limit for every API route.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Assemble the full application router for the configured role.
pub fn app(state: AppState) -> Router {
    let api: Router = match &state.role {
        RoleState::Provider(provider) => routes::provider_router().with_state(provider.clone()),
        RoleState::Consumer(consumer) => routes::consumer::router().with_state(consumer.clone()),
    };
    let api = api.layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let probes = Router::new()
        .route("/", get(index))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new()
        .merge(probes)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET / — service identification.
async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "dsc-api",
        "role": state.role().as_str(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health/liveness — the process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// GET /health/readiness — in-memory repositories need no warm-up.
async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics — Prometheus text exposition of the transition and peer
/// call counters. 503 when no recorder is installed.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
