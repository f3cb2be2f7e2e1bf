//! # API Errors
//!
//! Every failure leaves the server as
//! `{"success": false, "code": "...", "message": "..."}`.
//!
//! ```text
//! EngineError::NotFound ─────────► 404 NOT_FOUND
//! EngineError::InvalidState ─────► 409 INVALID_STATE
//! EngineError::Validation ───────► 400 VALIDATION_ERROR
//! EngineError::PaymentGateway ───► 502 PAYMENT_GATEWAY_ERROR
//! EngineError::RefundGateway ────► 502 REFUND_GATEWAY_ERROR
//! EngineError::Permission ───────► 403 PERMISSION_DENIED
//! EngineError::Conflict ─────────► 409 CONFLICT
//! EngineError::DuplicatePayment ─► 409 DUPLICATE_PAYMENT
//! EngineError::Database ─────────► 500 DATABASE_ERROR  (details logged only)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use receets_engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    ValidationError,
    PaymentGatewayError,
    RefundGatewayError,
    PermissionDenied,
    Unauthenticated,
    Conflict,
    DuplicatePayment,
    DatabaseError,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidState | ErrorCode::Conflict | ErrorCode::DuplicatePayment => {
                StatusCode::CONFLICT
            }
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::PaymentGatewayError | ErrorCode::RefundGatewayError => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An error as the client sees it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

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

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthenticated, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::PaymentGateway(_) => ErrorCode::PaymentGatewayError,
            EngineError::RefundGateway(_) => ErrorCode::RefundGatewayError,
            EngineError::Permission(_) => ErrorCode::PermissionDenied,
            EngineError::Conflict { .. } => ErrorCode::Conflict,
            EngineError::DuplicatePayment { .. } => ErrorCode::DuplicatePayment,
            EngineError::Database(detail) => {
                error!(error = %detail, "Request failed on the database");
                return ApiError::new(ErrorCode::DatabaseError, "A database error occurred");
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = ?self.code, message = %self.message, "Request failed");
        }
        let body = json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        });
        (status, Json(body)).into_response()
    }
}
