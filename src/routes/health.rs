use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;

use crate::state::AppState;

/// Liveness plus a bounded database probe. The endpoint always answers
/// within a few seconds even when the pool is wedged.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = match &state.db_pool {
        Some(pool) => {
            match tokio::time::timeout(
                Duration::from_secs(3),
                sqlx::query("SELECT 1").fetch_one(pool),
            )
            .await
            {
                Ok(Ok(_)) => true,
                Ok(Err(error)) => {
                    tracing::error!(error = %error, "Health check DB query failed");
                    false
                }
                Err(_) => {
                    tracing::error!("Health check DB query timed out (3s)");
                    false
                }
            }
        }
        // No database configured: the API still serves, report as-is.
        None => true,
    };

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": state.config.app_name,
        "now": Utc::now().to_rfc3339(),
        "db": db_ok
    }))
}
