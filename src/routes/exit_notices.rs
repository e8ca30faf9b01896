use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    schemas::{validate_input, ExitNoticePath, LeasePath, OrgQuery, SubmitExitNoticeInput},
    services::{audit::write_audit_log, exit_notice},
    state::AppState,
    tenancy::{require_role, resolve_context, WRITE_ROLES},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/leases/{lease_id}/exit-notices",
            axum::routing::get(list_exit_notices).post(submit_exit_notice),
        )
        .route(
            "/exit-notices/{notice_id}/confirm",
            axum::routing::post(confirm_exit_notice),
        )
        .route(
            "/exit-notices/{notice_id}/cancel",
            axum::routing::post(cancel_exit_notice),
        )
}

async fn submit_exit_notice(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(input): Json<SubmitExitNoticeInput>,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;
    validate_input(&input)?;

    let notice = exit_notice::submit(&state, &context, path.lease_id, &input).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "exit_notice.submitted",
        "exit_notice",
        notice.id,
        None,
        serde_json::to_value(&notice).ok(),
    )
    .await;
    Ok(Json(json!({ "data": notice })))
}

async fn confirm_exit_notice(
    State(state): State<AppState>,
    Path(path): Path<ExitNoticePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;

    let notice = exit_notice::confirm(&state, &context, path.notice_id).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "exit_notice.confirmed",
        "exit_notice",
        notice.id,
        None,
        serde_json::to_value(&notice).ok(),
    )
    .await;
    Ok(Json(json!({ "data": notice })))
}

async fn cancel_exit_notice(
    State(state): State<AppState>,
    Path(path): Path<ExitNoticePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    require_role(&state, &context, WRITE_ROLES).await?;

    let notice = exit_notice::cancel(&state, &context, path.notice_id).await?;
    write_audit_log(
        state.db_pool.as_ref(),
        context.org_id,
        context.user_id,
        "exit_notice.cancelled",
        "exit_notice",
        notice.id,
        None,
        serde_json::to_value(&notice).ok(),
    )
    .await;
    Ok(Json(json!({ "data": notice })))
}

async fn list_exit_notices(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let context = resolve_context(&state, &headers, query.org_id).await?;
    let rows = exit_notice::list_for_lease(&state, &context, path.lease_id).await?;
    Ok(Json(json!({ "data": rows })))
}
