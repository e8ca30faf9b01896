use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    model::PaymentStatus,
    schemas::{
        clamp_limit_in_range, validate_input, CompletePaymentInput, LeasePath, OrgQuery,
        PaymentPath, PaymentsQuery, RecordPaymentInput, UpdatePaymentInput,
    },
    services::{audit::write_audit_log, ledger},
    state::AppState,
    tenancy::{require_role, resolve_context, WRITE_ROLES},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/payments", axum::routing::post(record_payment))
        .route(
            "/payments/{payment_id}",
            axum::routing::patch(update_payment).delete(delete_payment),
        )
        .route(
            "/payments/{payment_id}/complete",
            axum::routing::post(complete_payment),
        )
        .route(
            "/leases/{lease_id}/payments",
            axum::routing::get(list_lease_payments),
        )
        .route(
            "/leases/{lease_id}/payments/pending",
            axum::routing::get(list_pending_payments),
        )
        .route(
            "/leases/{lease_id}/payments/summary",
            axum::routing::get(payment_summary),
        )
}

async fn record_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, input.organization_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let payment = ledger::record(&state, &context, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "payment.recorded",
        "payment",
        payment.id,
        None,
        serde_json::to_value(&payment).ok(),
    )
    .await;
    Ok(Json(json!({ "data": payment })))
}

async fn complete_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<CompletePaymentInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let payment = ledger::complete(&state, &context, path.payment_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "payment.completed",
        "payment",
        payment.id,
        None,
        serde_json::to_value(&payment).ok(),
    )
    .await;
    Ok(Json(json!({ "data": payment })))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<UpdatePaymentInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let payment = ledger::update(&state, &context, path.payment_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "payment.updated",
        "payment",
        payment.id,
        None,
        serde_json::to_value(&payment).ok(),
    )
    .await;
    Ok(Json(json!({ "data": payment })))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;

    ledger::delete(&state, &context, path.payment_id).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "payment.deleted",
        "payment",
        path.payment_id,
        None,
        None,
    )
    .await;
    Ok(Json(json!({ "data": { "deleted": true } })))
}

async fn list_lease_payments(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let rows = ledger::list_for_lease(
        &state,
        &context,
        path.lease_id,
        query.status,
        clamp_limit_in_range(query.limit, 1, 500),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn list_pending_payments(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let rows = ledger::list_for_lease(
        &state,
        &context,
        path.lease_id,
        Some(PaymentStatus::Pending),
        clamp_limit_in_range(query.limit, 1, 500),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn payment_summary(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let summary = ledger::summary(&state, &context, path.lease_id).await?;
    Ok(Json(json!({ "data": summary })))
}
