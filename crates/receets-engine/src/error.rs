//! # Engine Error Types
//!
//! The request-level taxonomy every operation reports in.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError::Validation, InsufficientTender, ... ──► Validation          │
//! │  CoreError::InvalidSaleStatus, VoidRequiresReturn ─► InvalidState       │
//! │  CoreError::PaymentNotFound ─────────────────────► NotFound             │
//! │                                                                         │
//! │  DbError::NotFound ──────────────────────────────► NotFound             │
//! │  DbError::UniqueViolation(payments.transaction_id) ► DuplicatePayment   │
//! │  DbError::UniqueViolation(other) ────────────────► Validation           │
//! │  DbError::VersionConflict ───────────────────────► Conflict (retried)   │
//! │  anything else ──────────────────────────────────► Database (logged)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use tracing::error;

use receets_core::{CoreError, ValidationError};
use receets_db::DbError;

/// Request-level errors.
///
/// No variant is raised after a partial write: the sale a caller sent a
/// request for is unchanged whenever an error comes back.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The record's status forbids the operation.
    ///
    /// ## When This Occurs
    /// - Paying a completed or voided sale
    /// - Voiding a completed sale that has payments
    /// - A cash refund when the merchant disallows them
    #[error("{0}")]
    InvalidState(String),

    /// Caller input was rejected.
    #[error("{0}")]
    Validation(String),

    /// The payment processor failed or timed out while charging.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// The payment processor failed or timed out while refunding.
    #[error("Refund gateway error: {0}")]
    RefundGateway(String),

    /// The principal does not own the record.
    #[error("{0}")]
    Permission(String),

    /// The record kept changing underneath every retry.
    ///
    /// ## When This Occurs
    /// Another process wrote the same sale or location between our read and
    /// our versioned save on every attempt of the conflict retry.
    #[error("{entity} {id} was modified concurrently, retry the request")]
    Conflict { entity: String, id: String },

    /// The transaction id is already recorded on some payment.
    #[error("A payment with transaction id {transaction_id} was already recorded")]
    DuplicatePayment { transaction_id: String },

    #[error("Database error: {0}")]
    Database(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        EngineError::Permission(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        EngineError::InvalidState(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    /// Names the transaction id on a duplicate-payment error.
    ///
    /// SQLite does not report the offending value, so payment paths fill it in.
    pub(crate) fn with_transaction_id(self, transaction_id: &str) -> Self {
        match self {
            EngineError::DuplicatePayment { .. } => EngineError::DuplicatePayment {
                transaction_id: transaction_id.to_string(),
            },
            other => other,
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        if err.is_validation() {
            return EngineError::Validation(err.to_string());
        }
        match err {
            CoreError::PaymentNotFound(id) => EngineError::not_found("Payment", id),
            other => EngineError::InvalidState(other.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::VersionConflict { entity, id } => EngineError::Conflict { entity, id },
            DbError::UniqueViolation { field, value } if field == "payments.transaction_id" => {
                EngineError::DuplicatePayment {
                    transaction_id: value,
                }
            }
            DbError::UniqueViolation { field, .. } => {
                let column = field.rsplit('.').next().unwrap_or(&field).to_string();
                EngineError::Validation(format!("{} is already in use", column))
            }
            other => {
                error!(error = %other, "Database error");
                EngineError::Database(other.to_string())
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
