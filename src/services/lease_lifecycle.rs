use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Lease, LeaseStatus, UnitOccupancy};
use crate::repository::{self, leases, payments, units};
use crate::schemas::RenewLeaseInput;
use crate::services::{obligations, rent_increase};
use crate::state::AppState;
use crate::tenancy::TenantContext;

/// Legal lease transitions. Renewal is not a transition: it extends an
/// active lease in place.
pub fn can_transition(from: LeaseStatus, to: LeaseStatus) -> bool {
    matches!(
        (from, to),
        (LeaseStatus::Draft, LeaseStatus::Active)
            | (LeaseStatus::Active, LeaseStatus::Expired)
            | (LeaseStatus::Active, LeaseStatus::Terminated)
    )
}

/// Activate a draft lease: occupy the unit and seed the first cycle of
/// pending payments. The status flip, unit update and generated periods
/// commit atomically.
pub async fn activate(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
) -> Result<Lease, AppError> {
    let _guard = state.lease_locks.acquire(lease_id).await;
    let pool = crate::tenancy::db_pool(state)?;

    let lease = leases::get(pool, context.org_id, lease_id).await?;
    if !can_transition(lease.status, LeaseStatus::Active) {
        return Err(AppError::InvalidStateTransition(format!(
            "Only draft leases can be activated (status: {:?}).",
            lease.status
        )));
    }
    // Unit must exist in this organization before anything commits.
    units::get(pool, context.org_id, lease.unit_id).await?;
    if leases::unit_has_active_lease(pool, context.org_id, lease.unit_id, lease.id).await? {
        return Err(AppError::UnitConflict(
            "Unit already has an active lease.".to_string(),
        ));
    }

    let mut tx = begin(pool).await?;
    let activated = leases::set_status_if(
        &mut *tx,
        context.org_id,
        lease_id,
        LeaseStatus::Draft,
        LeaseStatus::Active,
    )
    .await?
    .ok_or_else(|| {
        AppError::InvalidStateTransition("Lease is no longer in draft.".to_string())
    })?;

    // Re-check under the transaction: two activations for the same unit
    // must not both commit.
    if leases::unit_has_active_lease(&mut *tx, context.org_id, activated.unit_id, activated.id)
        .await?
    {
        return Err(AppError::UnitConflict(
            "Unit already has an active lease.".to_string(),
        ));
    }
    units::set_occupancy(
        &mut *tx,
        context.org_id,
        activated.unit_id,
        UnitOccupancy::Occupied,
    )
    .await?;

    let today = Utc::now().date_naive();
    obligations::ensure_schedule_tx(
        &mut tx,
        &activated,
        today,
        state.config.obligation_lookahead_months,
    )
    .await?;

    commit(tx).await?;
    tracing::info!(lease_id = %activated.id, org_id = %context.org_id, "Lease activated");
    Ok(activated)
}

/// Terminate an active lease, vacating the unit and dropping pending
/// obligations past the termination date.
pub async fn terminate(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
) -> Result<Lease, AppError> {
    let _guard = state.lease_locks.acquire(lease_id).await;
    let pool = crate::tenancy::db_pool(state)?;

    // Existence (within tenant scope) is checked before the state guard
    // so the caller sees NotFound rather than a transition error.
    leases::get(pool, context.org_id, lease_id).await?;

    let mut tx = begin(pool).await?;
    let today = Utc::now().date_naive();
    let terminated = terminate_in_tx(&mut tx, context.org_id, lease_id, today).await?;
    commit(tx).await?;

    tracing::info!(lease_id = %terminated.id, org_id = %context.org_id, "Lease terminated");
    Ok(terminated)
}

/// Shared termination body, also driven by exit-notice confirmation.
/// Runs inside the caller's transaction and lease lock.
pub(crate) async fn terminate_in_tx(
    tx: &mut PgConnection,
    org_id: Uuid,
    lease_id: Uuid,
    boundary: NaiveDate,
) -> Result<Lease, AppError> {
    let terminated = leases::set_status_if(
        &mut *tx,
        org_id,
        lease_id,
        LeaseStatus::Active,
        LeaseStatus::Terminated,
    )
    .await?
    .ok_or_else(|| {
        AppError::InvalidStateTransition("Only active leases can be terminated.".to_string())
    })?;

    units::set_occupancy(&mut *tx, org_id, terminated.unit_id, UnitOccupancy::Vacant).await?;
    let removed = payments::delete_pending_after(&mut *tx, org_id, lease_id, boundary).await?;
    if removed > 0 {
        tracing::info!(lease_id = %lease_id, removed, "Cancelled future pending payments");
    }
    Ok(terminated)
}

/// Extend an active lease. An omitted rent means no change; a provided
/// rent is routed through the rent-increase engine so the adjustment
/// history stays complete.
pub async fn renew(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
    input: &RenewLeaseInput,
) -> Result<Lease, AppError> {
    let _guard = state.lease_locks.acquire(lease_id).await;
    let pool = crate::tenancy::db_pool(state)?;

    let lease = leases::get(pool, context.org_id, lease_id).await?;
    if lease.status != LeaseStatus::Active {
        return Err(AppError::InvalidStateTransition(
            "Only active leases can be renewed.".to_string(),
        ));
    }
    if input.new_ends_on <= lease.ends_on {
        return Err(AppError::Validation(format!(
            "New end date must be after the current end date ({}).",
            lease.ends_on
        )));
    }

    let today = Utc::now().date_naive();
    let mut tx = begin(pool).await?;
    let mut renewed = leases::extend(&mut *tx, context.org_id, lease_id, input.new_ends_on)
        .await?
        .ok_or_else(|| {
            AppError::InvalidStateTransition("Lease is no longer active.".to_string())
        })?;

    if let Some(new_rent) = input.new_monthly_rent {
        if new_rent != renewed.monthly_rent {
            let (_, updated) = rent_increase::apply_in_tx(
                &mut tx,
                context,
                &renewed,
                new_rent,
                today,
                None,
            )
            .await?;
            renewed = updated;
        }
    }

    obligations::ensure_schedule_tx(
        &mut tx,
        &renewed,
        today,
        state.config.obligation_lookahead_months,
    )
    .await?;
    commit(tx).await?;

    tracing::info!(
        lease_id = %renewed.id,
        org_id = %context.org_id,
        renewal_count = renewed.renewal_count,
        ends_on = %renewed.ends_on,
        "Lease renewed"
    );
    Ok(renewed)
}

/// Expire one active lease past its end date. Scheduler-driven; takes
/// its own lock and transaction so one lease's failure stays its own.
pub async fn expire(state: &AppState, org_id: Uuid, lease_id: Uuid) -> Result<Lease, AppError> {
    let _guard = state.lease_locks.acquire(lease_id).await;
    let pool = crate::tenancy::db_pool(state)?;

    let mut tx = begin(pool).await?;
    let expired = leases::set_status_if(
        &mut *tx,
        org_id,
        lease_id,
        LeaseStatus::Active,
        LeaseStatus::Expired,
    )
    .await?
    .ok_or_else(|| {
        AppError::InvalidStateTransition("Only active leases can expire.".to_string())
    })?;

    units::set_occupancy(&mut *tx, org_id, expired.unit_id, UnitOccupancy::Vacant).await?;
    payments::delete_pending_after(&mut *tx, org_id, lease_id, expired.ends_on).await?;
    commit(tx).await?;

    tracing::info!(lease_id = %expired.id, %org_id, "Lease expired");
    Ok(expired)
}

pub(crate) async fn begin(pool: &PgPool) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, AppError> {
    pool.begin().await.map_err(repository::map_db_error)
}

pub(crate) async fn commit(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> Result<(), AppError> {
    tx.commit().await.map_err(repository::map_db_error)
}

#[cfg(test)]
mod tests {
    use super::can_transition;
    use crate::model::LeaseStatus::*;

    #[test]
    fn allows_only_legal_transitions() {
        assert!(can_transition(Draft, Active));
        assert!(can_transition(Active, Expired));
        assert!(can_transition(Active, Terminated));

        assert!(!can_transition(Draft, Expired));
        assert!(!can_transition(Draft, Terminated));
        assert!(!can_transition(Active, Draft));
        assert!(!can_transition(Expired, Active));
        assert!(!can_transition(Terminated, Active));
        assert!(!can_transition(Expired, Terminated));
    }
}
