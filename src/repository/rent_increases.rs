use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::RentIncrease;

use super::map_db_error;

#[allow(clippy::too_many_arguments)]
pub async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    old_rent: i64,
    new_rent: i64,
    increase_percentage: i32,
    effective_on: NaiveDate,
    reason: Option<&str>,
    applied_by: Uuid,
) -> Result<RentIncrease, AppError> {
    sqlx::query_as::<_, RentIncrease>(
        "INSERT INTO rent_increases (
            organization_id, lease_id, old_rent, new_rent,
            increase_percentage, effective_on, reason, applied_by
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(org_id)
    .bind(lease_id)
    .bind(old_rent)
    .bind(new_rent)
    .bind(increase_percentage)
    .bind(effective_on)
    .bind(reason)
    .bind(applied_by)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

/// Full adjustment history, oldest first. The generator folds over this
/// to price each period.
pub async fn list_for_lease<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<Vec<RentIncrease>, AppError> {
    sqlx::query_as::<_, RentIncrease>(
        "SELECT * FROM rent_increases
         WHERE organization_id = $1 AND lease_id = $2
         ORDER BY effective_on ASC, created_at ASC",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}
