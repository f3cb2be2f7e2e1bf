//! # Payment Gateway Seam
//!
//! The external card processor behind `receets_pay` payments. The engine
//! talks to it only through [`PaymentGateway`]; embedders supply an adapter
//! for their processor.
//!
//! ## Calls Per Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  gateway payment                                                        │
//! │  ├── ensure_customer_profile   only when the customer has no cached id  │
//! │  └── create_payment_intent     amount in minor units                    │
//! │                                                                         │
//! │  process refund (gateway path)                                          │
//! │  └── create_refund             against the original payment's intent    │
//! │                                                                         │
//! │  Each call runs under the configured timeout and is made at most once   │
//! │  per request.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a gateway adapter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The processor declined or rejected the request.
    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    /// The processor could not be reached.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// No processor is configured for this deployment.
    #[error("No payment gateway is configured")]
    NotConfigured,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Terminal state of a payment intent as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    Failed,
}

impl IntentStatus {
    pub fn succeeded(&self) -> bool {
        matches!(self, IntentStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub customer_profile_id: String,
    pub payment_method_id: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
    /// Connected account that receives the funds, when the merchant has one.
    pub transfer_destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
}

/// State of a refund as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Succeeded,
    /// Accepted and on its way back to the card.
    Pending,
    RequiresAction,
    Failed,
    Canceled,
}

impl RefundStatus {
    /// Whether the processor has committed to returning the money.
    ///
    /// Only then is the refund written to either sale.
    pub fn accepted(&self) -> bool {
        matches!(self, RefundStatus::Succeeded | RefundStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Succeeded => "succeeded",
            RefundStatus::Pending => "pending",
            RefundStatus::RequiresAction => "requires_action",
            RefundStatus::Failed => "failed",
            RefundStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRefund {
    pub id: String,
    pub status: RefundStatus,
}

/// An external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the processor's customer profile id, creating one if needed.
    async fn ensure_customer_profile(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
    ) -> GatewayResult<String>;

    /// Charges a saved payment method. The intent is confirmed immediately.
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent>;

    /// Refunds part or all of a captured intent.
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_minor: i64,
        reason: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> GatewayResult<GatewayRefund>;
}

/// Gateway used when no processor adapter is wired in.
///
/// Every call fails with [`GatewayError::NotConfigured`], so cash, card and
/// wallet flows keep working while gateway payments and refunds are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn ensure_customer_profile(
        &self,
        _email: &str,
        _name: &str,
        _phone: Option<&str>,
    ) -> GatewayResult<String> {
        Err(GatewayError::NotConfigured)
    }

    async fn create_payment_intent(
        &self,
        _request: PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent> {
        Err(GatewayError::NotConfigured)
    }

    async fn create_refund(
        &self,
        _payment_intent_id: &str,
        _amount_minor: i64,
        _reason: Option<&str>,
        _metadata: HashMap<String, String>,
    ) -> GatewayResult<GatewayRefund> {
        Err(GatewayError::NotConfigured)
    }
}
