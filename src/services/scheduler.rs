use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use serde::Serialize;
use tokio::time::sleep;
use uuid::Uuid;

use crate::services::{lease_lifecycle, obligations};
use crate::state::AppState;

const JOB_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct PendingPaymentsJobResult {
    pub organizations_scanned: u32,
    pub leases_scanned: u32,
    pub payments_created: u32,
    pub failures: u32,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct LeaseExpiryJobResult {
    pub organizations_scanned: u32,
    pub leases_expired: u32,
    pub failures: u32,
}

/// Spawn the background scheduler that runs periodic jobs.
///
/// Each job runs in its own `tokio::spawn` so a failure in one job
/// never crashes the scheduler loop or other jobs.
pub async fn run_background_scheduler(state: AppState) {
    tracing::info!("Background scheduler started");

    if state.db_pool.is_none() {
        tracing::warn!("Scheduler: no database pool configured, exiting");
        return;
    }

    let pending_interval =
        Duration::from_secs(state.config.pending_payments_interval_minutes.max(1) * 60);
    // First tick runs the pending-payments job immediately.
    let mut last_pending_run: Option<tokio::time::Instant> = None;
    let mut last_daily_run: Option<u32> = None;

    loop {
        sleep(Duration::from_secs(15)).await;

        let now_instant = tokio::time::Instant::now();
        let now_utc = Utc::now();
        let today = now_utc.date_naive();

        // --- Pending payment generation (every N minutes) ---
        let pending_due = last_pending_run
            .map_or(true, |last| now_instant.duration_since(last) >= pending_interval);
        if pending_due {
            last_pending_run = Some(now_instant);
            let st = state.clone();
            tokio::spawn(async move {
                let result = run_pending_payments_job(&st, None).await;
                if result.payments_created > 0 || result.failures > 0 {
                    tracing::info!(
                        organizations = result.organizations_scanned,
                        leases = result.leases_scanned,
                        created = result.payments_created,
                        failures = result.failures,
                        "Scheduler: pending payments generated"
                    );
                }
            });
        }

        // --- Daily jobs (run once per calendar day) ---
        let today_ordinal = today.ordinal();
        if last_daily_run == Some(today_ordinal) {
            continue;
        }
        if now_utc.hour() < state.config.daily_jobs_after_hour {
            continue;
        }
        last_daily_run = Some(today_ordinal);
        tracing::info!("Scheduler: running daily jobs for {today}");

        let st = state.clone();
        tokio::spawn(async move {
            let result = run_lease_expiry_job(&st, None).await;
            if result.leases_expired > 0 || result.failures > 0 {
                tracing::info!(
                    organizations = result.organizations_scanned,
                    expired = result.leases_expired,
                    failures = result.failures,
                    "Scheduler: lease expiry scan completed"
                );
            }
        });
    }
}

/// Generate due-but-unbilled payment periods for every active lease,
/// across all organizations or one. Each lease gets its own lock and
/// transaction; one lease's failure never aborts the rest.
pub async fn run_pending_payments_job(
    state: &AppState,
    org_id: Option<Uuid>,
) -> PendingPaymentsJobResult {
    let mut result = PendingPaymentsJobResult::default();
    let pool = match state.db_pool.as_ref() {
        Some(pool) => pool,
        None => return result,
    };

    let org_ids = match org_id {
        Some(org_id) => vec![org_id],
        None => match crate::repository::leases::org_ids_with_active_leases(pool).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(error = %error, "Pending payments job: org scan failed");
                result.failures += 1;
                return result;
            }
        },
    };

    let today = Utc::now().date_naive();
    for org_id in org_ids {
        result.organizations_scanned += 1;
        let leases =
            match crate::repository::leases::list_active(pool, org_id, JOB_BATCH_LIMIT).await {
                Ok(leases) => leases,
                Err(error) => {
                    tracing::warn!(%org_id, error = %error, "Pending payments job: lease scan failed");
                    result.failures += 1;
                    continue;
                }
            };

        for lease in leases {
            result.leases_scanned += 1;
            let _guard = state.lease_locks.acquire(lease.id).await;

            let created = async {
                let mut tx = lease_lifecycle::begin(pool).await?;
                let created = obligations::ensure_schedule_tx(
                    &mut tx,
                    &lease,
                    today,
                    state.config.obligation_lookahead_months,
                )
                .await?;
                lease_lifecycle::commit(tx).await?;
                Ok::<u32, crate::error::AppError>(created)
            }
            .await;

            match created {
                Ok(created) => result.payments_created += created,
                Err(error) => {
                    tracing::warn!(
                        lease_id = %lease.id,
                        %org_id,
                        error = %error,
                        "Pending payments job: lease failed"
                    );
                    result.failures += 1;
                }
            }
        }
    }
    result
}

/// Expire active leases whose end date has passed, vacating their units
/// and dropping stale pending obligations.
pub async fn run_lease_expiry_job(state: &AppState, org_id: Option<Uuid>) -> LeaseExpiryJobResult {
    let mut result = LeaseExpiryJobResult::default();
    let pool = match state.db_pool.as_ref() {
        Some(pool) => pool,
        None => return result,
    };

    let org_ids = match org_id {
        Some(org_id) => vec![org_id],
        None => match crate::repository::leases::org_ids_with_active_leases(pool).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(error = %error, "Lease expiry job: org scan failed");
                result.failures += 1;
                return result;
            }
        },
    };

    let today = Utc::now().date_naive();
    for org_id in org_ids {
        result.organizations_scanned += 1;
        let expired = match crate::repository::leases::list_active_ended_before(
            pool,
            org_id,
            today,
            JOB_BATCH_LIMIT,
        )
        .await
        {
            Ok(leases) => leases,
            Err(error) => {
                tracing::warn!(%org_id, error = %error, "Lease expiry job: lease scan failed");
                result.failures += 1;
                continue;
            }
        };

        for lease in expired {
            match lease_lifecycle::expire(state, org_id, lease.id).await {
                Ok(_) => result.leases_expired += 1,
                Err(error) => {
                    tracing::warn!(
                        lease_id = %lease.id,
                        %org_id,
                        error = %error,
                        "Lease expiry job: lease failed"
                    );
                    result.failures += 1;
                }
            }
        }
    }
    result
}
