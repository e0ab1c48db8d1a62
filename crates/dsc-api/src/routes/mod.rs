//! # API Route Modules
//!
//! Provider routes are split by resource. The consumer exposes one router
//! in [`consumer`] with the same paths where the concepts overlap, so a
//! client can talk to either role.

pub mod admin;
pub mod catalog;
pub mod consumer;
pub mod negotiations;
pub mod transfers;

use axum::Router;

use crate::state::ProviderState;

/// All provider routes.
pub fn provider_router() -> Router<ProviderState> {
    Router::new()
        .merge(catalog::router())
        .merge(negotiations::router())
        .merge(transfers::router())
        .merge(admin::router())
}
