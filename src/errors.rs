use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure envelope; same shape as a successful `ApiResponse` with `data`
/// absent.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error description
    pub error: String,
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub code: String,
    pub meta: crate::ResponseMeta,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Maps a unique-index violation to `Conflict` with `message`; any other
    /// database error passes through.
    pub fn from_insert(err: DbErr, message: impl FnOnce() -> String) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message()),
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Shorthand for a missing entity of a given kind.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", kind, id))
    }

    /// True for the optimistic-concurrency failure that callers may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrentModification(_))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) | Self::ConcurrentModification(_) => StatusCode::CONFLICT,
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) => "Internal server error".to_string(),
            Self::ConcurrentModification(id) => {
                format!("Concurrent modification for ID {}", id)
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let err = ErrorResponse {
            success: false,
            error: self.response_message(),
            code: status.canonical_reason().unwrap_or("Error").to_string(),
            meta: crate::ResponseMeta::capture(),
        };

        (status, Json(err)).into_response()
    }
}

pub type AppError = ServiceError;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ConcurrentModification(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("table metadata is locked".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::SerializationError("missing field `current_stock`".into())
                .response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Inventory item 42 not found".into()).response_message(),
            "Not found: Inventory item 42 not found"
        );
    }

    #[test]
    fn only_version_conflicts_are_retryable() {
        assert!(ServiceError::ConcurrentModification(Uuid::new_v4()).is_retryable());
        assert!(!ServiceError::Conflict("already clocked in".into()).is_retryable());
        assert!(!ServiceError::DatabaseError(DbErr::Custom("io".into())).is_retryable());
    }

    #[test]
    fn only_unique_violations_become_conflicts() {
        let other = ServiceError::from_insert(DbErr::Custom("disk full".into()), || {
            "duplicate".to_string()
        });
        assert!(matches!(other, ServiceError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn into_response_uses_status_and_message() {
        let response = ServiceError::not_found("Staff member", "abc").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!payload.success);
        assert_eq!(payload.code, "Not Found");
        assert_eq!(payload.error, "Not found: Staff member abc not found");
    }
}
