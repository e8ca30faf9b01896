use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Payment, PaymentStatus};
use crate::repository::{leases, payments};
use crate::schemas::{CompletePaymentInput, RecordPaymentInput, UpdatePaymentInput};
use crate::state::AppState;
use crate::tenancy::TenantContext;

/// Settled payments are history: only annotations may change after the
/// fact. Pending rows stay fully editable.
pub fn patch_allowed(status: PaymentStatus, input: &UpdatePaymentInput) -> bool {
    if status == PaymentStatus::Pending {
        return true;
    }
    input.amount.is_none() && input.payment_date.is_none() && input.method.is_none()
}

/// Record an already-settled payment outside the generated schedule
/// (cash collected on site, historical backfill).
pub async fn record(
    state: &AppState,
    context: &TenantContext,
    input: &RecordPaymentInput,
) -> Result<Payment, AppError> {
    if input.organization_id != context.org_id {
        return Err(AppError::Validation(
            "Payment organization does not match the request scope.".to_string(),
        ));
    }
    if input.period_start > input.period_end {
        return Err(AppError::Validation(
            "Period start must not be after period end.".to_string(),
        ));
    }

    let pool = crate::tenancy::db_pool(state)?;
    leases::get(pool, context.org_id, input.lease_id).await?;

    let payment = payments::insert_completed(pool, input).await?;
    tracing::info!(
        payment_id = %payment.id,
        lease_id = %payment.lease_id,
        org_id = %context.org_id,
        amount = payment.amount,
        "Manual payment recorded"
    );
    Ok(payment)
}

/// Settle a pending obligation. Completing twice, or completing a failed
/// or refunded row, is a conflict.
pub async fn complete(
    state: &AppState,
    context: &TenantContext,
    payment_id: Uuid,
    input: &CompletePaymentInput,
) -> Result<Payment, AppError> {
    let pool = crate::tenancy::db_pool(state)?;

    let completed = payments::complete_if_pending(
        pool,
        context.org_id,
        payment_id,
        input.amount,
        input.payment_date,
        input.method,
        input.reference.as_deref(),
    )
    .await?;

    match completed {
        Some(payment) => {
            tracing::info!(
                payment_id = %payment.id,
                lease_id = %payment.lease_id,
                org_id = %context.org_id,
                amount = payment.amount,
                "Payment completed"
            );
            Ok(payment)
        }
        None => {
            // Absent and not-pending look identical to the conditional
            // update; fetch once to report the right error.
            let existing = payments::get(pool, context.org_id, payment_id).await?;
            Err(AppError::InvalidStateTransition(format!(
                "Only pending payments can be completed (status: {:?}).",
                existing.status
            )))
        }
    }
}

pub async fn update(
    state: &AppState,
    context: &TenantContext,
    payment_id: Uuid,
    input: &UpdatePaymentInput,
) -> Result<Payment, AppError> {
    let pool = crate::tenancy::db_pool(state)?;

    let existing = payments::get(pool, context.org_id, payment_id).await?;
    if !patch_allowed(existing.status, input) {
        return Err(AppError::Conflict(format!(
            "Only reference and notes can change on a settled payment (status: {:?}).",
            existing.status
        )));
    }
    payments::patch(pool, context.org_id, payment_id, input).await
}

/// Delete a payment. Pending rows only; settled history is immutable.
pub async fn delete(
    state: &AppState,
    context: &TenantContext,
    payment_id: Uuid,
) -> Result<(), AppError> {
    let pool = crate::tenancy::db_pool(state)?;

    let deleted = payments::delete_if_pending(pool, context.org_id, payment_id).await?;
    if deleted == 0 {
        let existing = payments::get(pool, context.org_id, payment_id).await?;
        return Err(AppError::Conflict(format!(
            "Only pending payments can be deleted (status: {:?}).",
            existing.status
        )));
    }
    tracing::info!(payment_id = %payment_id, org_id = %context.org_id, "Pending payment deleted");
    Ok(())
}

pub async fn list_for_lease(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
    status: Option<PaymentStatus>,
    limit: i64,
) -> Result<Vec<Payment>, AppError> {
    let pool = crate::tenancy::db_pool(state)?;
    leases::get(pool, context.org_id, lease_id).await?;
    payments::list_for_lease(pool, context.org_id, lease_id, status, limit).await
}

pub async fn summary(
    state: &AppState,
    context: &TenantContext,
    lease_id: Uuid,
) -> Result<payments::PaymentSummary, AppError> {
    let pool = crate::tenancy::db_pool(state)?;
    leases::get(pool, context.org_id, lease_id).await?;
    payments::summary(pool, context.org_id, lease_id).await
}

#[cfg(test)]
mod tests {
    use super::patch_allowed;
    use crate::model::{PaymentMethod, PaymentStatus};
    use crate::schemas::UpdatePaymentInput;

    fn annotation_patch() -> UpdatePaymentInput {
        UpdatePaymentInput {
            amount: None,
            payment_date: None,
            method: None,
            reference: Some("wire-123".to_string()),
            notes: Some("late".to_string()),
        }
    }

    #[test]
    fn pending_payments_accept_any_patch() {
        let mut patch = annotation_patch();
        patch.amount = Some(1_200_000);
        patch.method = Some(PaymentMethod::Transfer);
        assert!(patch_allowed(PaymentStatus::Pending, &patch));
    }

    #[test]
    fn settled_payments_accept_only_annotations() {
        assert!(patch_allowed(PaymentStatus::Completed, &annotation_patch()));
        assert!(patch_allowed(PaymentStatus::Refunded, &annotation_patch()));

        let mut patch = annotation_patch();
        patch.amount = Some(1);
        assert!(!patch_allowed(PaymentStatus::Completed, &patch));

        let mut patch = annotation_patch();
        patch.payment_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1);
        assert!(!patch_allowed(PaymentStatus::Failed, &patch));
    }
}
