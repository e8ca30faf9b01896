use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{ExitNotice, ExitNoticeStatus};

use super::map_db_error;

#[allow(clippy::too_many_arguments)]
pub async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    notice_date: NaiveDate,
    planned_exit_on: NaiveDate,
    reason: Option<&str>,
    mutual_agreement: bool,
    penalty_amount: Option<i64>,
    penalty_waived: bool,
) -> Result<ExitNotice, AppError> {
    sqlx::query_as::<_, ExitNotice>(
        "INSERT INTO exit_notices (
            organization_id, lease_id, notice_date, planned_exit_on,
            reason, mutual_agreement, penalty_amount, penalty_waived, status
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
         RETURNING *",
    )
    .bind(org_id)
    .bind(lease_id)
    .bind(notice_date)
    .bind(planned_exit_on)
    .bind(reason)
    .bind(mutual_agreement)
    .bind(penalty_amount)
    .bind(penalty_waived)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

pub async fn get<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    notice_id: Uuid,
) -> Result<ExitNotice, AppError> {
    sqlx::query_as::<_, ExitNotice>(
        "SELECT * FROM exit_notices WHERE id = $1 AND organization_id = $2",
    )
    .bind(notice_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Exit notice not found.".to_string()))
}

pub async fn list_for_lease<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<Vec<ExitNotice>, AppError> {
    sqlx::query_as::<_, ExitNotice>(
        "SELECT * FROM exit_notices
         WHERE organization_id = $1 AND lease_id = $2
         ORDER BY created_at DESC",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}

/// A lease may carry at most one open (pending or confirmed) notice.
pub async fn has_open_notice<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM exit_notices
         WHERE organization_id = $1 AND lease_id = $2
           AND status IN ('pending', 'confirmed')",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)?;
    Ok(count > 0)
}

/// Flip a pending notice to confirmed/cancelled. `None` when absent or
/// not pending.
pub async fn set_status_if_pending<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    notice_id: Uuid,
    next: ExitNoticeStatus,
) -> Result<Option<ExitNotice>, AppError> {
    sqlx::query_as::<_, ExitNotice>(
        "UPDATE exit_notices SET status = $1, updated_at = now()
         WHERE id = $2 AND organization_id = $3 AND status = 'pending'
         RETURNING *",
    )
    .bind(next)
    .bind(notice_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)
}
