//! # Settlement
//!
//! How each way of paying turns an amount into a [`Payment`].
//!
//! ## Dispatch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tender                       method         status                     │
//! │  ──────                       ──────         ──────                     │
//! │  Cash { tendered }        ──► cash        ──► completed (change = t - a)│
//! │  Card { brand, last4 }    ──► card        ──► completed                 │
//! │  Wallet { method }        ──► apple/google/other ─► completed           │
//! │  Gateway(charge)          ──► receets_pay ──► completed | pending       │
//! │                                                                         │
//! │  One match, one place. The engine never branches on method strings.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transaction ids are chosen by the caller before a tender is built, so
//! settlement itself is deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Payment, PaymentMethod, PaymentStatus};
use crate::validation;

/// What the gateway reported for a charge it already processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub intent_id: String,
    /// Funds captured. `false` leaves the payment pending until confirmed.
    pub succeeded: bool,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
}

/// A way of paying, carrying only the data that method needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tender {
    Cash {
        /// Cash handed over. Defaults to the exact amount.
        tendered_cents: Option<i64>,
        transaction_id: String,
    },
    Card {
        card_brand: Option<String>,
        last4: Option<String>,
        transaction_id: String,
    },
    Wallet {
        method: PaymentMethod,
        transaction_id: String,
    },
    Gateway(GatewayCharge),
}

/// A settled tender, ready to be recorded on a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub transaction_id: String,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
    pub tendered_cents: Option<i64>,
    pub change_cents: Option<i64>,
}

impl Tender {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Tender::Cash { .. } => PaymentMethod::Cash,
            Tender::Card { .. } => PaymentMethod::Card,
            Tender::Wallet { method, .. } => *method,
            Tender::Gateway(_) => PaymentMethod::ReceetsPay,
        }
    }

    /// Settles `amount` with this tender.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` if amount ≤ 0
    /// - `Validation` if amount or cash tendered is above `MAX_AMOUNT_CENTS`
    /// - `InsufficientTender` if cash handed over is less than the amount
    /// - `Validation` for a malformed `last4`
    /// - `InvalidOperation` for a wallet tender naming a non-wallet method
    pub fn settle(self, amount: Money) -> CoreResult<SettlementOutcome> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        validation::validate_positive_amount("amount", amount.cents())?;

        let method = self.method();
        let outcome = match self {
            Tender::Cash {
                tendered_cents,
                transaction_id,
            } => {
                let tendered = tendered_cents.unwrap_or(amount.cents());
                validation::validate_non_negative("tendered", tendered)?;
                if tendered < amount.cents() {
                    return Err(CoreError::InsufficientTender {
                        amount_cents: amount.cents(),
                        tendered_cents: tendered,
                    });
                }
                SettlementOutcome {
                    method,
                    status: PaymentStatus::Completed,
                    amount,
                    transaction_id,
                    card_brand: None,
                    last4: None,
                    tendered_cents: Some(tendered),
                    change_cents: Some(tendered - amount.cents()),
                }
            }
            Tender::Card {
                card_brand,
                last4,
                transaction_id,
            } => {
                if let Some(last4) = &last4 {
                    validation::validate_last4(last4)?;
                }
                SettlementOutcome {
                    method,
                    status: PaymentStatus::Completed,
                    amount,
                    transaction_id,
                    card_brand,
                    last4,
                    tendered_cents: None,
                    change_cents: None,
                }
            }
            Tender::Wallet { transaction_id, .. } => {
                if !matches!(
                    method,
                    PaymentMethod::ApplePay | PaymentMethod::GooglePay | PaymentMethod::Other
                ) {
                    return Err(CoreError::InvalidOperation(format!(
                        "{} is not a wallet payment method",
                        method
                    )));
                }
                SettlementOutcome {
                    method,
                    status: PaymentStatus::Completed,
                    amount,
                    transaction_id,
                    card_brand: None,
                    last4: None,
                    tendered_cents: None,
                    change_cents: None,
                }
            }
            Tender::Gateway(charge) => SettlementOutcome {
                method,
                status: if charge.succeeded {
                    PaymentStatus::Completed
                } else {
                    PaymentStatus::Pending
                },
                amount,
                transaction_id: charge.intent_id,
                card_brand: charge.card_brand,
                last4: charge.last4,
                tendered_cents: None,
                change_cents: None,
            },
        };
        Ok(outcome)
    }
}

impl SettlementOutcome {
    pub fn into_payment(self, id: impl Into<String>, now: DateTime<Utc>) -> Payment {
        Payment {
            id: id.into(),
            method: self.method,
            amount_cents: self.amount.cents(),
            status: self.status,
            transaction_id: Some(self.transaction_id),
            card_brand: self.card_brand,
            last4: self.last4,
            tendered_cents: self.tendered_cents,
            change_cents: self.change_cents,
            refund_amount_cents: 0,
            refund_reason: None,
            refund_date: None,
            created_at: now,
        }
    }
}
