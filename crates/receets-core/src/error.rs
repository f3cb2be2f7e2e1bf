//! # Errors
//!
//! Rule violations raised by the pure sale logic in this crate.
//!
//! ```text
//! ValidationError ──► CoreError ──► EngineError ──► ApiError ──► {"code": ...}
//!   (bad input)       (bad state)    (+ storage,      (HTTP status)
//!                                      gateway)
//! ```
//!
//! Nothing here touches storage: a caller that gets a `CoreError` back still
//! holds the sale exactly as it loaded it.

use thiserror::Error;

use crate::types::SaleStatus;

/// A sale rule was broken.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The sale's status forbids the operation, e.g. editing a completed
    /// sale, paying a voided one or refunding against a draft return.
    #[error("Sale {sale_id} is {current_status}, cannot {operation}")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: SaleStatus,
        operation: String,
    },

    /// Completed sales with money against them are reversed with a return.
    #[error("Sale {sale_id} has payments; process a return instead of voiding")]
    VoidRequiresReturn { sale_id: String },

    /// Wrong kind of sale for the request (returning a return, refunding a
    /// purchase that has nothing left to give back).
    #[error("{0}")]
    InvalidOperation(String),

    #[error("A sale cannot have more than {max} line items")]
    TooManyLineItems { max: usize },

    #[error("Line quantity {requested} is over the limit of {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Payment amount rejected: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Tendered {tendered_cents} does not cover amount {amount_cents}")]
    InsufficientTender {
        amount_cents: i64,
        tendered_cents: i64,
    },

    #[error("Refund of {requested_cents} exceeds refundable balance of {available_cents}")]
    RefundExceedsBalance {
        requested_cents: i64,
        available_cents: i64,
    },

    /// An amount left the representable range; raised instead of wrapping.
    #[error("Amount out of range while computing {operation}")]
    AmountOverflow { operation: String },

    #[error("Payment {0} not found on sale")]
    PaymentNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn invalid_status(
        sale_id: impl Into<String>,
        current_status: SaleStatus,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidSaleStatus {
            sale_id: sale_id.into(),
            current_status,
            operation: operation.into(),
        }
    }

    /// Whether the caller can fix this by changing the request alone.
    ///
    /// The HTTP layer maps these to `VALIDATION_ERROR`; the rest are
    /// `INVALID_STATE`.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::TooManyLineItems { .. }
                | CoreError::QuantityTooLarge { .. }
                | CoreError::InvalidPaymentAmount { .. }
                | CoreError::InsufficientTender { .. }
                | CoreError::RefundExceedsBalance { .. }
                | CoreError::AmountOverflow { .. }
        )
    }
}

/// A single request field failed its check.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Unparseable id, email or currency code.
    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
