use axum::{routing::get, Router};

use crate::state::AppState;

pub mod exit_notices;
pub mod health;
pub mod jobs;
pub mod leases;
pub mod payments;
pub mod rent_increases;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(leases::router())
        .merge(payments::router())
        .merge(rent_increases::router())
        .merge(exit_notices::router())
        .merge(jobs::router())
}
