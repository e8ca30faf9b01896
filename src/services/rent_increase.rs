use sqlx::PgConnection;
use uuid::Uuid;

use chrono::{NaiveDate, Utc};

use crate::error::AppError;
use crate::model::{Lease, LeaseStatus, RentIncrease};
use crate::repository::{leases, payments, rent_increases};
use crate::schemas::RentIncreaseInput;
use crate::services::lease_lifecycle::{begin, commit};
use crate::state::AppState;
use crate::tenancy::TenantContext;

/// Percentage change rounded to the nearest whole percent.
pub fn increase_percentage(old_rent: i64, new_rent: i64) -> i32 {
    ((new_rent - old_rent) as f64 / old_rent as f64 * 100.0).round() as i32
}

/// Reject rents the engine cannot apply: non-positive or no-op changes.
pub fn validate_new_rent(current_rent: i64, new_rent: i64) -> Result<(), AppError> {
    if new_rent <= 0 {
        return Err(AppError::Validation(
            "Invalid rent: amount must be positive.".to_string(),
        ));
    }
    if new_rent == current_rent {
        return Err(AppError::Validation(
            "Invalid rent: new rent equals the current rent.".to_string(),
        ));
    }
    Ok(())
}

/// Apply a rent change to an active lease: append the adjustment record,
/// move the lease to the new rent, and recalculate pending obligations
/// from the effective date forward, all in one transaction.
pub async fn apply(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
    input: &RentIncreaseInput,
) -> Result<(RentIncrease, Lease), AppError> {
    let _guard = state.lease_locks.acquire(lease_id).await;
    let pool = crate::tenancy::db_pool(state)?;

    let lease = leases::get(pool, context.org_id, lease_id).await?;
    if lease.status != LeaseStatus::Active {
        return Err(AppError::InvalidStateTransition(
            "Rent increases apply only to active leases.".to_string(),
        ));
    }
    validate_new_rent(lease.monthly_rent, input.new_rent)?;

    let today = Utc::now().date_naive();
    if input.effective_on < today {
        return Err(AppError::Validation(
            "Effective date must not be in the past.".to_string(),
        ));
    }

    let mut tx = begin(pool).await?;
    let applied = apply_in_tx(
        &mut tx,
        context,
        &lease,
        input.new_rent,
        input.effective_on,
        input.reason.as_deref(),
    )
    .await?;
    commit(tx).await?;

    tracing::info!(
        lease_id = %lease_id,
        org_id = %context.org_id,
        old_rent = lease.monthly_rent,
        new_rent = input.new_rent,
        effective_on = %input.effective_on,
        "Rent increase applied"
    );
    Ok(applied)
}

/// Transactional body, shared with lease renewal. Assumes the caller
/// validated the lease state and the new rent, and holds the lease lock.
pub(crate) async fn apply_in_tx(
    tx: &mut PgConnection,
    context: &TenantContext,
    lease: &Lease,
    new_rent: i64,
    effective_on: NaiveDate,
    reason: Option<&str>,
) -> Result<(RentIncrease, Lease), AppError> {
    let percentage = increase_percentage(lease.monthly_rent, new_rent);
    let record = rent_increases::insert(
        &mut *tx,
        context.org_id,
        lease.id,
        lease.monthly_rent,
        new_rent,
        percentage,
        effective_on,
        reason,
        context.user_id,
    )
    .await?;

    let updated = leases::apply_rent(&mut *tx, context.org_id, lease.id, new_rent, effective_on)
        .await?
        .ok_or_else(|| {
            AppError::InvalidStateTransition("Lease is no longer active.".to_string())
        })?;

    let retagged =
        payments::retag_pending_amounts(&mut *tx, context.org_id, lease.id, effective_on, new_rent)
            .await?;
    if retagged > 0 {
        tracing::info!(lease_id = %lease.id, retagged, "Recalculated pending payments");
    }

    Ok((record, updated))
}

#[cfg(test)]
mod tests {
    use super::{increase_percentage, validate_new_rent};

    #[test]
    fn computes_rounded_percentage() {
        assert_eq!(increase_percentage(1_000_000, 1_100_000), 10);
        assert_eq!(increase_percentage(1_000_000, 1_050_000), 5);
        assert_eq!(increase_percentage(900_000, 1_000_000), 11); // 11.11 → 11
        assert_eq!(increase_percentage(1_000_000, 1_015_000), 2); // 1.5 → 2
        assert_eq!(increase_percentage(1_000_000, 900_000), -10);
    }

    #[test]
    fn rejects_invalid_rents() {
        assert!(validate_new_rent(1_000_000, 0).is_err());
        assert!(validate_new_rent(1_000_000, -5).is_err());
        assert!(validate_new_rent(1_000_000, 1_000_000).is_err());
        assert!(validate_new_rent(1_000_000, 1_100_000).is_ok());
        assert!(validate_new_rent(1_000_000, 900_000).is_ok());
    }
}
