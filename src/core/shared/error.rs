use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::error;

use crate::security::auth_api::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Limit reached: {0}")]
    LimitReached(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::LimitReached(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(e) => e.status_code(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::LimitReached(_) => "limit_reached",
            Self::Unavailable(_) => "service_unavailable",
            Self::Database(_) => "database_error",
            Self::Upstream(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
            Self::Auth(e) => e.error_code(),
        }
    }

    /// Message shown to clients. Storage and internal failures are not echoed back.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::LimitReached(msg)
            | Self::Unavailable(msg)
            | Self::Upstream(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Auth(e) => e.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": self.error_code(),
                "message": self.public_message()
            })),
        )
            .into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(format!("Duplicate record: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Validation(format!("Referenced record missing: {}", info.message()))
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        Self::Database(format!("Connection pool error: {}", e))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::not_found("Course").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::LimitReached("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Auth(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::Database("relation \"users\" does not exist".into());
        assert_eq!(err.public_message(), "An internal error occurred");
        assert_eq!(err.error_code(), "database_error");

        let err = ApiError::Validation("Title is required".into());
        assert_eq!(err.public_message(), "Title is required");
    }

    #[test]
    fn test_diesel_not_found_maps_to_404() {
        let err: ApiError = DieselError::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
