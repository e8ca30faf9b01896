use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::Renter;

use super::map_db_error;

pub async fn get<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    renter_id: Uuid,
) -> Result<Renter, AppError> {
    sqlx::query_as::<_, Renter>(
        "SELECT id, organization_id, full_name, email, phone
         FROM renters WHERE id = $1 AND organization_id = $2",
    )
    .bind(renter_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Renter not found.".to_string()))
}
