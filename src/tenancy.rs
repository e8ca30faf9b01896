use sqlx::PgPool;
use uuid::Uuid;

use crate::{auth::require_user_id, error::AppError, state::AppState};

/// Roles allowed to mutate engine-owned records.
pub const WRITE_ROLES: &[&str] = &["owner_admin", "operator", "accountant"];

/// The acting tenant for a request, resolved once at the edge and passed
/// explicitly into every service call. There is no ambient "current
/// tenant" state; impersonation is a property of the context, not a
/// global overlay.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub is_impersonating: bool,
}

/// Resolve the tenant context for a request targeting `org_id`.
///
/// Members act directly. Platform admins may act on any organization and
/// are flagged as impersonating. Everyone else is rejected.
pub async fn resolve_context(
    state: &AppState,
    headers: &axum::http::HeaderMap,
    org_id: Uuid,
) -> Result<TenantContext, AppError> {
    let user_id = require_user_id(state, headers)?;

    if membership_role(state, org_id, user_id).await?.is_some() {
        return Ok(TenantContext {
            org_id,
            user_id,
            is_impersonating: false,
        });
    }

    if is_platform_admin(state, user_id).await? {
        tracing::info!(%org_id, %user_id, "Platform admin impersonating organization");
        return Ok(TenantContext {
            org_id,
            user_id,
            is_impersonating: true,
        });
    }

    Err(AppError::Forbidden(
        "Forbidden: not a member of this organization.".to_string(),
    ))
}

/// Require one of `allowed_roles` for a mutating operation.
/// Impersonating platform admins bypass the role check.
pub async fn require_role(
    state: &AppState,
    context: &TenantContext,
    allowed_roles: &[&str],
) -> Result<(), AppError> {
    if context.is_impersonating {
        return Ok(());
    }

    let role = membership_role(state, context.org_id, context.user_id)
        .await?
        .unwrap_or_else(|| "unknown".to_string());

    if role_allowed(&role, allowed_roles) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "Forbidden: role '{role}' is not allowed for this action."
    )))
}

pub fn role_allowed(role: &str, allowed_roles: &[&str]) -> bool {
    allowed_roles.contains(&role)
}

async fn membership_role(
    state: &AppState,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<Option<String>, AppError> {
    if let Some(cached) = state.membership_cache.get(&(org_id, user_id)).await {
        return Ok(cached);
    }

    let pool = db_pool(state)?;
    let role = fetch_membership_role(pool, org_id, user_id).await?;
    state
        .membership_cache
        .insert((org_id, user_id), role.clone())
        .await;
    Ok(role)
}

async fn fetch_membership_role(
    pool: &PgPool,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<Option<String>, AppError> {
    sqlx::query_scalar::<_, String>(
        "SELECT role::text FROM organization_members
         WHERE organization_id = $1 AND user_id = $2
         LIMIT 1",
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|error| AppError::Dependency(format!("Membership lookup failed: {error}")))
}

async fn is_platform_admin(state: &AppState, user_id: Uuid) -> Result<bool, AppError> {
    let pool = db_pool(state)?;
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM platform_admins WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|error| AppError::Dependency(format!("Platform admin lookup failed: {error}")))?;
    Ok(found > 0)
}

pub fn db_pool(state: &AppState) -> Result<&PgPool, AppError> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{role_allowed, WRITE_ROLES};

    #[test]
    fn write_roles_cover_back_office() {
        assert!(role_allowed("owner_admin", WRITE_ROLES));
        assert!(role_allowed("operator", WRITE_ROLES));
        assert!(role_allowed("accountant", WRITE_ROLES));
        assert!(!role_allowed("viewer", WRITE_ROLES));
        assert!(!role_allowed("unknown", WRITE_ROLES));
    }
}
