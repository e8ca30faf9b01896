use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Resolve the authenticated user id from the request headers.
///
/// Order: dev override header (non-production only), then HS256 bearer
/// token. Anything else is `Unauthorized`.
pub fn require_user_id(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
            return Uuid::parse_str(raw.trim()).map_err(|_| {
                AppError::Unauthorized("Invalid x-user-id override header.".to_string())
            });
        }
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token.".to_string()))?;

    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency("JWT_SECRET is not configured; cannot verify tokens.".to_string())
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    Uuid::parse_str(data.claims.sub.trim())
        .map_err(|_| AppError::Unauthorized("Token subject is not a user id.".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
