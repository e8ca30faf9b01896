pub mod exit_notices;
pub mod leases;
pub mod payments;
pub mod renters;
pub mod rent_increases;
pub mod units;

use crate::error::AppError;

/// Map driver errors onto the engine taxonomy. Unique-constraint
/// violations surface as `Conflict` so idempotent writers can detect
/// a lost race on (lease_id, period_start); foreign-key violations
/// surface as `NotFound` so an absent referenced id never reads as an
/// infrastructure failure.
pub(crate) fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");
    let lowered = message.to_ascii_lowercase();

    if message.contains("23505")
        || lowered.contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    if message.contains("23503") || lowered.contains("violates foreign key constraint") {
        return AppError::NotFound("Referenced record not found.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use super::map_db_error;
    use crate::error::AppError;

    fn db_error(message: &str) -> sqlx::Error {
        sqlx::Error::Protocol(message.to_string())
    }

    #[test]
    fn maps_unique_violations_to_conflict() {
        let mapped = map_db_error(db_error(
            "error returned from database: duplicate key value violates unique constraint \
             \"uq_payments_pending_period\" (SQLSTATE 23505)",
        ));
        assert!(matches!(mapped, AppError::Conflict(_)));
    }

    #[test]
    fn maps_foreign_key_violations_to_not_found() {
        let mapped = map_db_error(db_error(
            "error returned from database: insert or update on table \"leases\" violates \
             foreign key constraint \"leases_renter_id_fkey\" (SQLSTATE 23503)",
        ));
        assert!(matches!(mapped, AppError::NotFound(_)));
    }

    #[test]
    fn everything_else_is_a_dependency_failure() {
        let mapped = map_db_error(db_error("connection reset by peer"));
        assert!(matches!(mapped, AppError::Dependency(_)));
    }
}
