use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    model::LeaseStatus,
    repository::{leases, renters, units},
    schemas::{
        clamp_limit_in_range, validate_input, CreateLeaseInput, LeasePath, LeasesQuery, OrgQuery,
        RenewLeaseInput, UpdateLeaseInput,
    },
    services::{audit::write_audit_log, lease_lifecycle},
    state::AppState,
    tenancy::{db_pool, require_role, resolve_context, WRITE_ROLES},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/leases",
            axum::routing::get(list_leases).post(create_lease),
        )
        .route(
            "/leases/{lease_id}",
            axum::routing::get(get_lease).patch(update_lease),
        )
        .route(
            "/leases/{lease_id}/activate",
            axum::routing::post(activate_lease),
        )
        .route(
            "/leases/{lease_id}/terminate",
            axum::routing::post(terminate_lease),
        )
        .route("/leases/{lease_id}/renew", axum::routing::post(renew_lease))
}

async fn create_lease(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateLeaseInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, input.organization_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;
    input.check_dates()?;

    let pool = db_pool(&state)?;
    // Both referenced records must exist in this organization before the
    // draft is cut.
    units::get(pool, context.org_id, input.unit_id).await?;
    renters::get(pool, context.org_id, input.renter_id).await?;
    let lease = leases::insert(pool, &input).await?;

    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.created",
        "lease",
        lease.id,
        None,
        serde_json::to_value(&lease).ok(),
    )
    .await;
    Ok(Json(json!({ "data": lease })))
}

async fn list_leases(
    State(state): State<AppState>,
    Query(query): Query<LeasesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let pool = db_pool(&state)?;

    let rows = leases::list(
        pool,
        context.org_id,
        query.status,
        query.unit_id,
        query.renter_id,
        clamp_limit_in_range(query.limit, 1, 500),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn get_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let pool = db_pool(&state)?;
    let lease = leases::get(pool, context.org_id, path.lease_id).await?;
    Ok(Json(json!({ "data": lease })))
}

async fn update_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<UpdateLeaseInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let pool = db_pool(&state)?;
    let existing = leases::get(pool, context.org_id, path.lease_id).await?;
    if existing.status != LeaseStatus::Draft && input.touches_contract_terms() {
        return Err(AppError::InvalidStateTransition(format!(
            "Contract terms are frozen once a lease leaves draft (status: {:?}).",
            existing.status
        )));
    }
    let starts_on = input.starts_on.unwrap_or(existing.starts_on);
    let ends_on = input.ends_on.unwrap_or(existing.ends_on);
    if ends_on <= starts_on {
        return Err(AppError::Validation(
            "End date must be after the start date.".to_string(),
        ));
    }

    let updated = leases::patch(pool, context.org_id, path.lease_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.updated",
        "lease",
        updated.id,
        serde_json::to_value(&existing).ok(),
        serde_json::to_value(&updated).ok(),
    )
    .await;
    Ok(Json(json!({ "data": updated })))
}

async fn activate_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;

    let lease = lease_lifecycle::activate(&state, &context, path.lease_id).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.activated",
        "lease",
        lease.id,
        None,
        serde_json::to_value(&lease).ok(),
    )
    .await;
    Ok(Json(json!({ "data": lease })))
}

async fn terminate_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;

    let lease = lease_lifecycle::terminate(&state, &context, path.lease_id).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.terminated",
        "lease",
        lease.id,
        None,
        serde_json::to_value(&lease).ok(),
    )
    .await;
    Ok(Json(json!({ "data": lease })))
}

async fn renew_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<RenewLeaseInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let lease = lease_lifecycle::renew(&state, &context, path.lease_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "lease.renewed",
        "lease",
        lease.id,
        None,
        serde_json::to_value(&lease).ok(),
    )
    .await;
    Ok(Json(json!({ "data": lease })))
}
