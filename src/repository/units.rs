use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Unit, UnitOccupancy};

use super::map_db_error;

pub async fn get<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    unit_id: Uuid,
) -> Result<Unit, AppError> {
    sqlx::query_as::<_, Unit>(
        "SELECT id, organization_id, property_id, occupancy
         FROM units WHERE id = $1 AND organization_id = $2",
    )
    .bind(unit_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

pub async fn set_occupancy<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    unit_id: Uuid,
    occupancy: UnitOccupancy,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE units SET occupancy = $1, updated_at = now()
         WHERE id = $2 AND organization_id = $3",
    )
    .bind(occupancy)
    .bind(unit_id)
    .bind(org_id)
    .execute(exec)
    .await
    .map_err(map_db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Unit not found.".to_string()));
    }
    Ok(())
}
