use chrono::{Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{ExitNotice, ExitNoticeStatus, Lease, LeaseStatus};
use crate::repository::{exit_notices, leases};
use crate::schemas::SubmitExitNoticeInput;
use crate::services::lease_lifecycle::{self, begin, commit};
use crate::state::AppState;
use crate::tenancy::TenantContext;

/// Computed penalty for one notice: the amount owed and whether it was
/// waived by mutual agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyOutcome {
    pub amount: i64,
    pub waived: bool,
}

pub fn days_notice(today: NaiveDate, planned_exit_on: NaiveDate) -> i64 {
    (planned_exit_on - today).num_days()
}

/// A departure within the first contract year carries a penalty unless
/// both parties agreed to it.
pub fn is_in_first_year(starts_on: NaiveDate, planned_exit_on: NaiveDate) -> bool {
    let first_anniversary = starts_on
        .checked_add_months(Months::new(12))
        .unwrap_or(starts_on);
    planned_exit_on < first_anniversary
}

/// First-year unilateral exits owe the contractual penalty, defaulting
/// to two months of rent. Everything else owes nothing; mutual
/// agreement marks the zero as a waiver.
pub fn compute_penalty(lease: &Lease, planned_exit_on: NaiveDate, mutual_agreement: bool) -> PenaltyOutcome {
    if is_in_first_year(lease.starts_on, planned_exit_on) && !mutual_agreement {
        return PenaltyOutcome {
            amount: lease
                .early_termination_penalty
                .unwrap_or(2 * lease.monthly_rent),
            waived: false,
        };
    }
    PenaltyOutcome {
        amount: 0,
        waived: mutual_agreement,
    }
}

/// Submit a renter's notice of intent to vacate an active lease.
pub async fn submit(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
    input: &SubmitExitNoticeInput,
) -> Result<ExitNotice, AppError> {
    let pool = crate::tenancy::db_pool(state)?;

    let lease = leases::get(pool, context.org_id, lease_id).await?;
    if lease.status != LeaseStatus::Active {
        return Err(AppError::InvalidStateTransition(
            "Exit notices apply only to active leases.".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let notice_days = days_notice(today, input.planned_exit_on);
    if notice_days < i64::from(lease.notice_required_days) {
        return Err(AppError::InsufficientNotice(format!(
            "Notice of {notice_days} days is below the required {} days.",
            lease.notice_required_days
        )));
    }
    if exit_notices::has_open_notice(pool, context.org_id, lease_id).await? {
        return Err(AppError::Conflict(
            "Lease already has an open exit notice.".to_string(),
        ));
    }

    let penalty = compute_penalty(&lease, input.planned_exit_on, input.mutual_agreement);
    let notice = exit_notices::insert(
        pool,
        context.org_id,
        lease_id,
        today,
        input.planned_exit_on,
        input.reason.as_deref(),
        input.mutual_agreement,
        Some(penalty.amount),
        penalty.waived,
    )
    .await?;

    tracing::info!(
        notice_id = %notice.id,
        lease_id = %lease_id,
        org_id = %context.org_id,
        planned_exit_on = %input.planned_exit_on,
        penalty_amount = penalty.amount,
        penalty_waived = penalty.waived,
        "Exit notice submitted"
    );
    Ok(notice)
}

/// Confirm a pending notice and terminate the lease in one transaction,
/// so a failed termination leaves the notice pending.
pub async fn confirm(
    state: &AppState,
    context: &TenantContext,
    notice_id: Uuid,
) -> Result<ExitNotice, AppError> {
    let pool = crate::tenancy::db_pool(state)?;
    let notice = exit_notices::get(pool, context.org_id, notice_id).await?;

    let _guard = state.lease_locks.acquire(notice.lease_id).await;
    let mut tx = begin(pool).await?;
    let confirmed = exit_notices::set_status_if_pending(
        &mut *tx,
        context.org_id,
        notice_id,
        ExitNoticeStatus::Confirmed,
    )
    .await?
    .ok_or_else(|| {
        AppError::InvalidStateTransition("Only pending exit notices can be confirmed.".to_string())
    })?;

    lease_lifecycle::terminate_in_tx(
        &mut tx,
        context.org_id,
        confirmed.lease_id,
        confirmed.planned_exit_on,
    )
    .await?;
    commit(tx).await?;

    tracing::info!(
        notice_id = %confirmed.id,
        lease_id = %confirmed.lease_id,
        org_id = %context.org_id,
        "Exit notice confirmed, lease terminated"
    );
    Ok(confirmed)
}

/// Cancel a pending notice. The lease is untouched.
pub async fn cancel(
    state: &AppState,
    context: &TenantContext,
    notice_id: Uuid,
) -> Result<ExitNotice, AppError> {
    let pool = crate::tenancy::db_pool(state)?;
    // Scope check first so a foreign id reads as absent.
    exit_notices::get(pool, context.org_id, notice_id).await?;

    let cancelled = exit_notices::set_status_if_pending(
        pool,
        context.org_id,
        notice_id,
        ExitNoticeStatus::Cancelled,
    )
    .await?
    .ok_or_else(|| {
        AppError::InvalidStateTransition("Only pending exit notices can be cancelled.".to_string())
    })?;

    tracing::info!(
        notice_id = %cancelled.id,
        lease_id = %cancelled.lease_id,
        org_id = %context.org_id,
        "Exit notice cancelled"
    );
    Ok(cancelled)
}

pub async fn list_for_lease(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
) -> Result<Vec<ExitNotice>, AppError> {
    let pool = crate::tenancy::db_pool(state)?;
    leases::get(pool, context.org_id, lease_id).await?;
    exit_notices::list_for_lease(pool, context.org_id, lease_id).await
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::{compute_penalty, days_notice, is_in_first_year, PenaltyOutcome};
    use crate::model::{Lease, LeaseStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn lease(starts_on: NaiveDate, monthly_rent: i64, penalty: Option<i64>) -> Lease {
        Lease {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            renter_id: Uuid::new_v4(),
            starts_on,
            ends_on: starts_on
                .checked_add_months(chrono::Months::new(24))
                .expect("valid date"),
            monthly_rent,
            security_deposit: None,
            status: LeaseStatus::Active,
            notes: None,
            contract_document_ref: None,
            original_ends_on: starts_on
                .checked_add_months(chrono::Months::new(24))
                .expect("valid date"),
            renewal_count: 0,
            notice_required_days: 90,
            early_termination_penalty: penalty,
            last_increase_on: None,
            is_migrated: false,
            first_payment_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_year_unilateral_exit_owes_two_months_rent() {
        let lease = lease(date(2024, 1, 1), 1_000_000, None);
        assert_eq!(
            compute_penalty(&lease, date(2024, 6, 1), false),
            PenaltyOutcome {
                amount: 2_000_000,
                waived: false,
            }
        );
    }

    #[test]
    fn contractual_override_replaces_the_default_penalty() {
        let lease = lease(date(2024, 1, 1), 1_000_000, Some(1_500_000));
        assert_eq!(
            compute_penalty(&lease, date(2024, 6, 1), false).amount,
            1_500_000
        );
    }

    #[test]
    fn mutual_agreement_waives_the_penalty() {
        let lease = lease(date(2024, 1, 1), 1_000_000, None);
        assert_eq!(
            compute_penalty(&lease, date(2024, 6, 1), true),
            PenaltyOutcome {
                amount: 0,
                waived: true,
            }
        );
    }

    #[test]
    fn no_penalty_after_the_first_year() {
        let lease = lease(date(2024, 1, 1), 1_000_000, None);
        let unilateral = compute_penalty(&lease, date(2025, 2, 1), false);
        assert_eq!(unilateral.amount, 0);
        assert!(!unilateral.waived);

        let mutual = compute_penalty(&lease, date(2025, 2, 1), true);
        assert_eq!(mutual.amount, 0);
        assert!(mutual.waived);
    }

    #[test]
    fn first_year_boundary_is_exclusive_of_the_anniversary() {
        assert!(is_in_first_year(date(2024, 1, 1), date(2024, 12, 31)));
        assert!(!is_in_first_year(date(2024, 1, 1), date(2025, 1, 1)));
    }

    #[test]
    fn counts_days_of_notice() {
        assert_eq!(days_notice(date(2024, 1, 1), date(2024, 1, 31)), 30);
        assert_eq!(days_notice(date(2024, 1, 1), date(2024, 3, 31)), 90);
        assert_eq!(days_notice(date(2024, 3, 1), date(2024, 2, 1)), -29);
    }
}
