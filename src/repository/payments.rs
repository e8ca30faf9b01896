use chrono::NaiveDate;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Payment, PaymentMethod, PaymentStatus};
use crate::schemas::{RecordPaymentInput, UpdatePaymentInput};

use super::map_db_error;

/// Materialize one generated obligation: pending, due on period start.
pub async fn insert_pending<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    amount: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (
            organization_id, lease_id, amount, payment_date,
            period_start, period_end, status
         ) VALUES ($1, $2, $3, $4, $4, $5, 'pending')
         RETURNING *",
    )
    .bind(org_id)
    .bind(lease_id)
    .bind(amount)
    .bind(period_start)
    .bind(period_end)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

/// Ad-hoc manual recording: completed immediately, outside the
/// generated schedule.
pub async fn insert_completed<'e>(
    exec: impl PgExecutor<'e>,
    input: &RecordPaymentInput,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (
            organization_id, lease_id, amount, payment_date,
            period_start, period_end, method, status, reference, notes
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'completed', $8, $9)
         RETURNING *",
    )
    .bind(input.organization_id)
    .bind(input.lease_id)
    .bind(input.amount)
    .bind(input.payment_date)
    .bind(input.period_start)
    .bind(input.period_end)
    .bind(input.method)
    .bind(input.reference.as_deref())
    .bind(input.notes.as_deref())
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

pub async fn get<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    payment_id: Uuid,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 AND organization_id = $2")
        .bind(payment_id)
        .bind(org_id)
        .fetch_optional(exec)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

pub async fn list_for_lease<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    status: Option<PaymentStatus>,
    limit: i64,
) -> Result<Vec<Payment>, AppError> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT * FROM payments WHERE organization_id = ",
    );
    query.push_bind(org_id);
    query.push(" AND lease_id = ").push_bind(lease_id);
    if let Some(status) = status {
        query.push(" AND status = ").push_bind(status);
    }
    query
        .push(" ORDER BY period_start ASC LIMIT ")
        .push_bind(limit);

    query
        .build_query_as::<Payment>()
        .fetch_all(exec)
        .await
        .map_err(map_db_error)
}

/// Period starts already materialized for a lease; the generator's
/// dedup set.
pub async fn existing_period_starts<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<Vec<NaiveDate>, AppError> {
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT period_start FROM payments
         WHERE organization_id = $1 AND lease_id = $2
         ORDER BY period_start ASC",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}

/// Settle a pending obligation. `None` when the row is absent or not
/// pending anymore.
pub async fn complete_if_pending<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    payment_id: Uuid,
    amount: i64,
    payment_date: NaiveDate,
    method: PaymentMethod,
    reference: Option<&str>,
) -> Result<Option<Payment>, AppError> {
    sqlx::query_as::<_, Payment>(
        "UPDATE payments
         SET status = 'completed', amount = $1, payment_date = $2,
             method = $3, reference = $4, updated_at = now()
         WHERE id = $5 AND organization_id = $6 AND status = 'pending'
         RETURNING *",
    )
    .bind(amount)
    .bind(payment_date)
    .bind(method)
    .bind(reference)
    .bind(payment_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)
}

pub async fn patch<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    payment_id: Uuid,
    input: &UpdatePaymentInput,
) -> Result<Payment, AppError> {
    let mut query = QueryBuilder::<Postgres>::new("UPDATE payments SET updated_at = now()");
    if let Some(amount) = input.amount {
        query.push(", amount = ").push_bind(amount);
    }
    if let Some(payment_date) = input.payment_date {
        query.push(", payment_date = ").push_bind(payment_date);
    }
    if let Some(method) = input.method {
        query.push(", method = ").push_bind(method);
    }
    if let Some(reference) = input.reference.as_deref() {
        query.push(", reference = ").push_bind(reference.to_string());
    }
    if let Some(notes) = input.notes.as_deref() {
        query.push(", notes = ").push_bind(notes.to_string());
    }
    query.push(" WHERE id = ").push_bind(payment_id);
    query.push(" AND organization_id = ").push_bind(org_id);
    query.push(" RETURNING *");

    query
        .build_query_as::<Payment>()
        .fetch_optional(exec)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

/// Delete a single payment, only while pending. Returns rows affected.
pub async fn delete_if_pending<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    payment_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM payments
         WHERE id = $1 AND organization_id = $2 AND status = 'pending'",
    )
    .bind(payment_id)
    .bind(org_id)
    .execute(exec)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

/// True for a pending period that falls past a termination/expiry
/// boundary. The period starting exactly on the boundary is still due.
pub(crate) fn dropped_at_boundary(period_start: NaiveDate, boundary: NaiveDate) -> bool {
    period_start > boundary
}

/// True for a pending period repriced by a rent change: the effective
/// date's own period is included.
pub(crate) fn repriced_from(period_start: NaiveDate, effective_on: NaiveDate) -> bool {
    period_start >= effective_on
}

/// Pending (id, period_start) pairs for a lease.
async fn pending_periods(
    conn: &mut PgConnection,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<Vec<(Uuid, NaiveDate)>, AppError> {
    sqlx::query_as::<_, (Uuid, NaiveDate)>(
        "SELECT id, period_start FROM payments
         WHERE organization_id = $1 AND lease_id = $2 AND status = 'pending'",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_all(conn)
    .await
    .map_err(map_db_error)
}

/// Remove not-yet-due pending obligations past a termination/expiry
/// boundary. Settled history is never touched.
pub async fn delete_pending_after(
    conn: &mut PgConnection,
    org_id: Uuid,
    lease_id: Uuid,
    boundary: NaiveDate,
) -> Result<u64, AppError> {
    let ids = pending_periods(&mut *conn, org_id, lease_id)
        .await?
        .into_iter()
        .filter(|(_, period_start)| dropped_at_boundary(*period_start, boundary))
        .map(|(id, _)| id)
        .collect::<Vec<_>>();
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "DELETE FROM payments
         WHERE organization_id = $1 AND status = 'pending' AND id = ANY($2)",
    )
    .bind(org_id)
    .bind(&ids)
    .execute(conn)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

/// Recalculate pending obligations falling on or after a rent change's
/// effective date.
pub async fn retag_pending_amounts(
    conn: &mut PgConnection,
    org_id: Uuid,
    lease_id: Uuid,
    effective_on: NaiveDate,
    new_amount: i64,
) -> Result<u64, AppError> {
    let ids = pending_periods(&mut *conn, org_id, lease_id)
        .await?
        .into_iter()
        .filter(|(_, period_start)| repriced_from(*period_start, effective_on))
        .map(|(id, _)| id)
        .collect::<Vec<_>>();
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE payments SET amount = $1, updated_at = now()
         WHERE organization_id = $2 AND status = 'pending' AND id = ANY($3)",
    )
    .bind(new_amount)
    .bind(org_id)
    .bind(&ids)
    .execute(conn)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, Copy, serde::Serialize, sqlx::FromRow)]
pub struct PaymentSummary {
    pub completed_total: i64,
    pub completed_count: i64,
}

pub async fn summary<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<PaymentSummary, AppError> {
    sqlx::query_as::<_, PaymentSummary>(
        "SELECT COALESCE(SUM(amount), 0)::bigint AS completed_total,
                COUNT(*)::bigint AS completed_count
         FROM payments
         WHERE organization_id = $1 AND lease_id = $2 AND status = 'completed'",
    )
    .bind(org_id)
    .bind(lease_id)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{dropped_at_boundary, repriced_from};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn termination_keeps_the_period_due_on_the_boundary() {
        let boundary = date(2024, 6, 15);
        assert!(!dropped_at_boundary(date(2024, 6, 15), boundary));
        assert!(!dropped_at_boundary(date(2024, 5, 1), boundary));
        assert!(dropped_at_boundary(date(2024, 6, 16), boundary));
        assert!(dropped_at_boundary(date(2024, 7, 15), boundary));
    }

    #[test]
    fn reprice_includes_the_effective_date_itself() {
        let effective_on = date(2024, 3, 1);
        assert!(repriced_from(date(2024, 3, 1), effective_on));
        assert!(repriced_from(date(2024, 4, 1), effective_on));
        assert!(!repriced_from(date(2024, 2, 29), effective_on));
    }
}
