use axum::extract::State;
use axum::http::StatusCode;
use axum::{extract::Request, middleware::Next, response::Response};

use crate::state::AppState;

/// Reject requests whose Host header is not in the allow list. A `*`
/// entry disables the check.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let trusted = &state.config.trusted_hosts;
    if trusted.iter().any(|host| host == "*") {
        return Ok(next.run(request).await);
    }

    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).to_string());

    match host {
        Some(host) if trusted.iter().any(|trusted| trusted == &host) => {
            Ok(next.run(request).await)
        }
        _ => {
            tracing::warn!(host = host.as_deref().unwrap_or("<missing>"), "Untrusted host rejected");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}
