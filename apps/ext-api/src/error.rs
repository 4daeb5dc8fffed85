//! # API Error Type
//!
//! Unified error type for HTTP handlers and middleware.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler                                                                │
//! │  Result<Json<T>, ApiError>                                              │
//! │         │                                                               │
//! │         ├── DbError::NotFound ────────────────► 404 NOT_FOUND           │
//! │         ├── DbError::UniqueViolation ─────────► 409 CONFLICT            │
//! │         ├── DbError::Domain(CoreError) ───────► per variant             │
//! │         │     ├── Validation ─────────────────► 400 VALIDATION_ERROR    │
//! │         │     ├── InsufficientStock ──────────► 422 INSUFFICIENT_STOCK  │
//! │         │     ├── InUse / CashbackAlreadyExists► 409 CONFLICT           │
//! │         │     └── other business rules ───────► 422 BUSINESS_LOGIC      │
//! │         ├── Json/Query/Path rejection ────────► 400 VALIDATION_ERROR    │
//! │         └── other DbError ────────────────────► 500 DATABASE_ERROR      │
//! │                                                 (details logged only)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Body: `{ "code": "NOT_FOUND", "message": "Container type not found: ..." }`

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use titan_ext_core::CoreError;
use titan_ext_db::DbError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body returned by every failing request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Duplicate or still referenced (409)
    Conflict,

    /// Business rule rejected the operation (422)
    BusinessLogic,

    /// Not enough component stock (422)
    InsufficientStock,

    /// Missing or invalid bearer token (401)
    Unauthorized,

    /// Token lacks the route's permission (403)
    Forbidden,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::BusinessLogic | ErrorCode::InsufficientStock => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(permission: &str) -> Self {
        ApiError::new(
            ErrorCode::Forbidden,
            format!("Missing permission: {}", permission),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::Domain(core) => core.into(),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InUse { .. } | CoreError::CashbackAlreadyExists { .. } => {
                ErrorCode::Conflict
            }
            CoreError::ExcessReturn { .. }
            | CoreError::InsufficientContainers { .. }
            | CoreError::InvalidOrderTransition { .. }
            | CoreError::OrderAlreadyCompleted(_)
            | CoreError::CircularDependency { .. }
            | CoreError::InvalidCashbackTransition { .. }
            | CoreError::NotEligible { .. }
            | CoreError::Inactive { .. } => ErrorCode::BusinessLogic,
        };

        let message = match err {
            CoreError::Validation(v) => v.to_string(),
            other => other.to_string(),
        };

        ApiError::new(code, message)
    }
}

// Extractor rejections (see `crate::extract`): malformed input is a 400.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_ext_core::ValidationError;

    #[test]
    fn test_domain_error_codes() {
        let err: ApiError = DbError::Domain(CoreError::InsufficientStock {
            sku: "FLOUR".to_string(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.code.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = DbError::from(ValidationError::Required {
            field: "name".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "name is required");

        let err: ApiError = CoreError::in_use("BOM", "b-1", "orders").into();
        assert_eq!(err.code.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_database_details_hidden() {
        let err: ApiError = DbError::QueryFailed("no such table: secret".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_wire_format() {
        let err = ApiError::forbidden("loyalty.manage");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "FORBIDDEN");
        assert_eq!(json["message"], "Missing permission: loyalty.manage");
    }
}
