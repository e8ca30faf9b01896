use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    repository::{leases, rent_increases},
    schemas::{validate_input, LeasePath, OrgQuery, RentIncreaseInput},
    services::{audit::write_audit_log, rent_increase},
    state::AppState,
    tenancy::{db_pool, require_role, resolve_context, WRITE_ROLES},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/leases/{lease_id}/rent-increases",
        axum::routing::get(list_rent_increases).post(apply_rent_increase),
    )
}

async fn apply_rent_increase(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<RentIncreaseInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let (record, lease) = rent_increase::apply(&state, &context, path.lease_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.rent_increased",
        "rent_increase",
        record.id,
        None,
        serde_json::to_value(&record).ok(),
    )
    .await;
    Ok(Json(json!({ "data": { "increase": record, "lease": lease } })))
}

async fn list_rent_increases(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let pool = db_pool(&state)?;
    leases::get(pool, context.org_id, path.lease_id).await?;
    let rows = rent_increases::list_for_lease(pool, context.org_id, path.lease_id).await?;
    Ok(Json(json!({ "data": rows })))
}
