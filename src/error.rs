use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy for the lease engine.
///
/// `NotFound` covers both truly absent ids and ids that exist under a
/// different organization: repository queries always filter on
/// organization_id, so the two are indistinguishable to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidStateTransition(String),
    #[error("{0}")]
    UnitConflict(String),
    #[error("{0}")]
    InsufficientNotice(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::UnitConflict(_) => "unit_conflict",
            Self::InsufficientNotice(_) => "insufficient_notice",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Dependency(_) => "dependency_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InsufficientNotice(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidStateTransition(_) | Self::UnitConflict(_) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;

    #[test]
    fn maps_engine_errors_to_statuses() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InvalidStateTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::UnitConflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InsufficientNotice("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AppError::UnitConflict("x".into()).kind(), "unit_conflict");
        assert_eq!(
            AppError::InsufficientNotice("x".into()).kind(),
            "insufficient_notice"
        );
        assert_eq!(
            AppError::InvalidStateTransition("x".into()).kind(),
            "invalid_state_transition"
        );
    }
}
