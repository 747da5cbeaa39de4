//! HTTP routes

pub mod ops;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/webhooks/scheduling", post(webhooks::scheduling_webhook))
        .route("/internal/compensations", post(ops::compensate))
        .route("/internal/invariants", get(ops::check_invariants))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
