use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    schemas::OrgQuery,
    services::scheduler,
    state::AppState,
    tenancy::{require_role, resolve_context},
};

/// Manual job triggers are an administrative surface, not day-to-day
/// back office.
const JOB_ROLES: &[&str] = &["owner_admin"];

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/jobs/pending-payments",
            axum::routing::post(trigger_pending_payments),
        )
        .route(
            "/jobs/lease-expiry",
            axum::routing::post(trigger_lease_expiry),
        )
}

async fn trigger_pending_payments(
    State(state): State<AppState>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, JOB_ROLES).await?;

    let result = scheduler::run_pending_payments_job(&state, Some(context.org_id)).await;
    tracing::info!(
        org_id = %context.org_id,
        user_id = %context.user_id,
        created = result.payments_created,
        "Pending payments job triggered manually"
    );
    Ok(Json(json!({ "data": result })))
}

async fn trigger_lease_expiry(
    State(state): State<AppState>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, JOB_ROLES).await?;

    let result = scheduler::run_lease_expiry_job(&state, Some(context.org_id)).await;
    tracing::info!(
        org_id = %context.org_id,
        user_id = %context.user_id,
        expired = result.leases_expired,
        "Lease expiry job triggered manually"
    );
    Ok(Json(json!({ "data": result })))
}
