//! Error types for the Bookhouse server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Numeric error codes returned alongside every error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchRecord = 5,
    BookUnavailable = 7,
    Duplicate = 8,
    MaxBorrowsReached = 11,
    NotBorrowable = 12,
    BadValue = 18,
    InvalidReturn = 22,
    NoFineDue = 23,
    SignatureInvalid = 24,
    GatewayFailure = 25,
    OrderMismatch = 26,
}

/// Rejections raised by the borrow ledger.
///
/// Every variant is raised before (or instead of) a commit, so the store is
/// left untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Borrow limit reached ({active}/{max})")]
    LimitExceeded { active: i64, max: i64 },

    #[error("Book {0} is not available")]
    BookUnavailable(i32),

    #[error("Borrow {0} is not currently borrowed")]
    InvalidReturn(i32),

    #[error("No fine is due on borrow {0}")]
    NoFineDue(i32),

    #[error("Payment signature is invalid")]
    SignatureInvalid,

    #[error("Checkout {0} does not match the outstanding fine")]
    OrderMismatch(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Only students can borrow books")]
    NotStudent,
}

impl LedgerError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            LedgerError::LimitExceeded { .. } => (StatusCode::CONFLICT, ErrorCode::MaxBorrowsReached),
            LedgerError::BookUnavailable(_) => (StatusCode::CONFLICT, ErrorCode::BookUnavailable),
            LedgerError::InvalidReturn(_) => (StatusCode::CONFLICT, ErrorCode::InvalidReturn),
            LedgerError::NoFineDue(_) => (StatusCode::CONFLICT, ErrorCode::NoFineDue),
            LedgerError::SignatureInvalid => (StatusCode::BAD_REQUEST, ErrorCode::SignatureInvalid),
            LedgerError::OrderMismatch(_) => (StatusCode::BAD_REQUEST, ErrorCode::OrderMismatch),
            LedgerError::RecordNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord),
            LedgerError::NotStudent => (StatusCode::FORBIDDEN, ErrorCode::NotBorrowable),
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status and error code this error is reported with
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::Ledger(e) => e.status_and_code(),
            AppError::Gateway(_) => (StatusCode::BAD_GATEWAY, ErrorCode::GatewayFailure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Gateway(e) => {
                tracing::error!("Payment gateway error: {}", e);
                e.to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Ledger(e) => e.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
