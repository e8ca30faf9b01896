use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Append one audit row. Failures are logged and swallowed so an audit
/// outage never blocks the mutation it describes.
pub async fn write_audit_log(
    pool: Option<&PgPool>,
    org_id: Uuid,
    user_id: Uuid,
    action: &str,
    resource_type: &str,
    resource_id: Uuid,
    old_values: Option<Value>,
    new_values: Option<Value>,
) {
    let Some(pool) = pool else {
        return;
    };

    let result = sqlx::query(
        "INSERT INTO audit_logs (
            organization_id, user_id, action, resource_type, resource_id,
            old_values, new_values
         ) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(org_id)
    .bind(user_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(old_values)
    .bind(new_values)
    .execute(pool)
    .await;

    if let Err(error) = result {
        tracing::warn!(%action, %resource_id, error = %error, "Audit log write failed");
    }
}
