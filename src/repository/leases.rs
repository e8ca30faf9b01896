use chrono::NaiveDate;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Lease, LeaseStatus};
use crate::schemas::{CreateLeaseInput, UpdateLeaseInput};

use super::map_db_error;

pub async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    input: &CreateLeaseInput,
) -> Result<Lease, AppError> {
    sqlx::query_as::<_, Lease>(
        "INSERT INTO leases (
            organization_id, unit_id, renter_id, starts_on, ends_on,
            monthly_rent, security_deposit, status, notes,
            contract_document_ref, original_ends_on, renewal_count,
            notice_required_days, early_termination_penalty,
            is_migrated, first_payment_on
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8, $9, $5, 0, $10, $11, $12, $13)
         RETURNING *",
    )
    .bind(input.organization_id)
    .bind(input.unit_id)
    .bind(input.renter_id)
    .bind(input.starts_on)
    .bind(input.ends_on)
    .bind(input.monthly_rent)
    .bind(input.security_deposit)
    .bind(input.notes.as_deref())
    .bind(input.contract_document_ref.as_deref())
    .bind(input.notice_required_days)
    .bind(input.early_termination_penalty)
    .bind(input.is_migrated)
    .bind(input.first_payment_on)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)
}

pub async fn get<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
) -> Result<Lease, AppError> {
    sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE id = $1 AND organization_id = $2")
        .bind(lease_id)
        .bind(org_id)
        .fetch_optional(exec)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn list<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    status: Option<LeaseStatus>,
    unit_id: Option<Uuid>,
    renter_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<Lease>, AppError> {
    let mut query =
        QueryBuilder::<Postgres>::new("SELECT * FROM leases WHERE organization_id = ");
    query.push_bind(org_id);
    if let Some(status) = status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(unit_id) = unit_id {
        query.push(" AND unit_id = ").push_bind(unit_id);
    }
    if let Some(renter_id) = renter_id {
        query.push(" AND renter_id = ").push_bind(renter_id);
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

    query
        .build_query_as::<Lease>()
        .fetch_all(exec)
        .await
        .map_err(map_db_error)
}

/// Apply a draft/notes patch. Callers have already decided which fields
/// are legal for the lease's current status.
pub async fn patch<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    input: &UpdateLeaseInput,
) -> Result<Lease, AppError> {
    let mut query = QueryBuilder::<Postgres>::new("UPDATE leases SET updated_at = now()");
    if let Some(starts_on) = input.starts_on {
        query.push(", starts_on = ").push_bind(starts_on);
    }
    if let Some(ends_on) = input.ends_on {
        // Drafts keep original_ends_on in lockstep until activation.
        query.push(", ends_on = ").push_bind(ends_on);
        query.push(", original_ends_on = ").push_bind(ends_on);
    }
    if let Some(monthly_rent) = input.monthly_rent {
        query.push(", monthly_rent = ").push_bind(monthly_rent);
    }
    if let Some(security_deposit) = input.security_deposit {
        query.push(", security_deposit = ").push_bind(security_deposit);
    }
    if let Some(notice_days) = input.notice_required_days {
        query.push(", notice_required_days = ").push_bind(notice_days);
    }
    if let Some(penalty) = input.early_termination_penalty {
        query
            .push(", early_termination_penalty = ")
            .push_bind(penalty);
    }
    if let Some(notes) = input.notes.as_deref() {
        query.push(", notes = ").push_bind(notes.to_string());
    }
    if let Some(doc_ref) = input.contract_document_ref.as_deref() {
        query
            .push(", contract_document_ref = ")
            .push_bind(doc_ref.to_string());
    }
    query.push(" WHERE id = ").push_bind(lease_id);
    query.push(" AND organization_id = ").push_bind(org_id);
    query.push(" RETURNING *");

    query
        .build_query_as::<Lease>()
        .fetch_optional(exec)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

/// Compare-and-set status flip. Returns `None` when the lease is absent
/// or no longer in `expected`; the caller decides which error applies.
pub async fn set_status_if<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    expected: LeaseStatus,
    next: LeaseStatus,
) -> Result<Option<Lease>, AppError> {
    sqlx::query_as::<_, Lease>(
        "UPDATE leases SET status = $1, updated_at = now()
         WHERE id = $2 AND organization_id = $3 AND status = $4
         RETURNING *",
    )
    .bind(next)
    .bind(lease_id)
    .bind(org_id)
    .bind(expected)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)
}

/// Extend an active lease. The status guard makes a renewal racing a
/// termination lose cleanly.
pub async fn extend<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    new_ends_on: NaiveDate,
) -> Result<Option<Lease>, AppError> {
    sqlx::query_as::<_, Lease>(
        "UPDATE leases
         SET ends_on = $1, renewal_count = renewal_count + 1, updated_at = now()
         WHERE id = $2 AND organization_id = $3 AND status = 'active'
         RETURNING *",
    )
    .bind(new_ends_on)
    .bind(lease_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)
}

pub async fn apply_rent<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    lease_id: Uuid,
    new_rent: i64,
    effective_on: NaiveDate,
) -> Result<Option<Lease>, AppError> {
    sqlx::query_as::<_, Lease>(
        "UPDATE leases
         SET monthly_rent = $1, last_increase_on = $2, updated_at = now()
         WHERE id = $3 AND organization_id = $4 AND status = 'active'
         RETURNING *",
    )
    .bind(new_rent)
    .bind(effective_on)
    .bind(lease_id)
    .bind(org_id)
    .fetch_optional(exec)
    .await
    .map_err(map_db_error)
}

/// Whether the unit already carries another active lease. The exclusion
/// lets activation re-check without tripping over the lease itself.
pub async fn unit_has_active_lease<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    unit_id: Uuid,
    exclude_lease: Uuid,
) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM leases
         WHERE organization_id = $1 AND unit_id = $2 AND status = 'active' AND id <> $3",
    )
    .bind(org_id)
    .bind(unit_id)
    .bind(exclude_lease)
    .fetch_one(exec)
    .await
    .map_err(map_db_error)?;
    Ok(count > 0)
}

pub async fn list_active<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    limit: i64,
) -> Result<Vec<Lease>, AppError> {
    sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE organization_id = $1 AND status = 'active'
         ORDER BY starts_on ASC LIMIT $2",
    )
    .bind(org_id)
    .bind(limit)
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}

pub async fn list_active_ended_before<'e>(
    exec: impl PgExecutor<'e>,
    org_id: Uuid,
    cutoff: NaiveDate,
    limit: i64,
) -> Result<Vec<Lease>, AppError> {
    sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE organization_id = $1 AND status = 'active' AND ends_on < $2
         ORDER BY ends_on ASC LIMIT $3",
    )
    .bind(org_id)
    .bind(cutoff)
    .bind(limit)
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}

/// Organizations that currently have at least one active lease — the
/// scheduler's per-tenant work list.
pub async fn org_ids_with_active_leases<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<Uuid>, AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT organization_id FROM leases WHERE status = 'active'",
    )
    .fetch_all(exec)
    .await
    .map_err(map_db_error)
}
