//! # Return/Refund Linker
//!
//! A return is its own sale (type `return`, negative line items) pointing at
//! the purchase it reverses. Money goes back in a separate refund step.
//!
//! ## Refund Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  return sale (completed) ──► plan_refund(amount)                        │
//! │                                   │                                     │
//! │              ┌────────────────────┴────────────────────┐                │
//! │              ▼                                         ▼                │
//! │   original has a gateway payment            no gateway payment          │
//! │   with a transaction id                     (or no original)            │
//! │              │                                         │                │
//! │   RefundPlan::Gateway                        RefundPlan::Manual         │
//! │              │                                         │                │
//! │   gateway refund (engine)                              │                │
//! │              │                                         │                │
//! │   apply_gateway_refund(original)                       │                │
//! │   refund_amount += amount                              │                │
//! │              │                                         │                │
//! │              └───────────► record_refund_payment ◄─────┘                │
//! │                           (return sale gets -amount)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A manual refund leaves the original sale untouched. Only gateway refunds
//! are annotated on the original payment.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Payment, PaymentMethod, PaymentStatus, Sale, SaleStatus, SaleType};
use crate::validation;

// =============================================================================
// Return Origin
// =============================================================================

/// Checks that `original` may have a return issued against it.
///
/// ## Rules
/// - must be a purchase
/// - must be completed
pub fn validate_return_origin(original: &Sale) -> CoreResult<()> {
    if original.sale_type != SaleType::Purchase {
        return Err(CoreError::Validation(crate::ValidationError::InvalidFormat {
            field: "originalSaleId".to_string(),
            reason: format!("sale {} is a {}, not a purchase", original.id, original.sale_type),
        }));
    }
    if original.status != SaleStatus::Completed {
        return Err(CoreError::invalid_status(
            &original.id,
            original.status,
            "accept a return",
        ));
    }
    Ok(())
}

/// Start of the window in which purchases can still be returned.
pub fn return_window_start(now: DateTime<Utc>, return_period_days: i64) -> DateTime<Utc> {
    now - Duration::days(return_period_days)
}

pub fn is_within_return_window(sale: &Sale, return_period_days: i64, now: DateTime<Utc>) -> bool {
    sale.created_at >= return_window_start(now, return_period_days)
}

// =============================================================================
// Refund Planning
// =============================================================================

/// Where the money for a refund comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundPlan {
    /// Refund through the gateway against a payment on the original sale.
    Gateway {
        payment_id: String,
        transaction_id: String,
        card_brand: Option<String>,
        last4: Option<String>,
        refundable: Money,
    },
    /// No gateway payment to reverse: pay out by hand.
    Manual,
}

/// What a return sale can still pay out: its magnitude less refunds already recorded.
pub fn remaining_refundable(return_sale: &Sale) -> Money {
    let already: Money = return_sale
        .payments
        .iter()
        .filter(|p| p.is_refund())
        .map(|p| p.amount().magnitude())
        .sum();
    return_sale.total().magnitude().remaining_after(already)
}

/// Decides how `amount` is refunded for `return_sale`.
///
/// ## Errors
/// - `InvalidSaleStatus` if the return is not completed
/// - `InvalidOperation` if the sale is not a return, or every gateway
///   payment on the original is already fully refunded
/// - `InvalidPaymentAmount` / `RefundExceedsBalance` for a bad amount
pub fn plan_refund(
    return_sale: &Sale,
    original: Option<&Sale>,
    amount: Money,
) -> CoreResult<RefundPlan> {
    if return_sale.sale_type != SaleType::Return {
        return Err(CoreError::InvalidOperation(format!(
            "Sale {} is a {}; refunds are issued against return sales",
            return_sale.id, return_sale.sale_type
        )));
    }
    if return_sale.status != SaleStatus::Completed {
        return Err(CoreError::invalid_status(
            &return_sale.id,
            return_sale.status,
            "refund",
        ));
    }
    validation::validate_positive_amount("amount", amount.cents())?;

    let remaining = remaining_refundable(return_sale);
    if amount > remaining {
        return Err(CoreError::RefundExceedsBalance {
            requested_cents: amount.cents(),
            available_cents: remaining.cents(),
        });
    }

    let Some(original) = original else {
        return Ok(RefundPlan::Manual);
    };

    let gateway_payments: Vec<&Payment> = original
        .payments
        .iter()
        .filter(|p| p.method.is_gateway() && p.transaction_id.is_some())
        .collect();
    if gateway_payments.is_empty() {
        return Ok(RefundPlan::Manual);
    }

    let payment = gateway_payments
        .into_iter()
        .find(|p| {
            matches!(
                p.status,
                PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
            ) && p.refundable().is_positive()
        })
        .ok_or_else(|| {
            CoreError::InvalidOperation(format!(
                "Every gateway payment on sale {} is already refunded",
                original.id
            ))
        })?;

    let refundable = payment.refundable();
    if amount > refundable {
        return Err(CoreError::RefundExceedsBalance {
            requested_cents: amount.cents(),
            available_cents: refundable.cents(),
        });
    }

    Ok(RefundPlan::Gateway {
        payment_id: payment.id.clone(),
        transaction_id: payment.transaction_id.clone().unwrap_or_default(),
        card_brand: payment.card_brand.clone(),
        last4: payment.last4.clone(),
        refundable,
    })
}

// =============================================================================
// Applying Refunds
// =============================================================================

/// Annotates the original payment after the gateway accepted a refund.
pub fn apply_gateway_refund(
    original: &mut Sale,
    payment_id: &str,
    amount: Money,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let payment = original
        .payments
        .iter_mut()
        .find(|p| p.id == payment_id)
        .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

    let refundable = payment.refundable();
    if amount > refundable {
        return Err(CoreError::RefundExceedsBalance {
            requested_cents: amount.cents(),
            available_cents: refundable.cents(),
        });
    }

    payment.refund_amount_cents += amount.cents();
    payment.status = if payment.refund_amount_cents >= payment.amount_cents {
        PaymentStatus::Refunded
    } else {
        PaymentStatus::PartiallyRefunded
    };
    payment.refund_reason = reason.map(str::to_string);
    payment.refund_date = Some(now);
    original.updated_at = now;
    Ok(())
}

/// A refund payout to record on the return sale.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub payment_id: String,
    pub method: PaymentMethod,
    /// Positive magnitude; stored negated.
    pub amount: Money,
    pub transaction_id: String,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
    pub reason: Option<String>,
}

/// Appends the refund as a negative completed payment on the return sale.
///
/// Return sales are already completed when refunded, so the payment-status
/// guard of [`Sale::apply_payment`] does not apply here.
pub fn record_refund_payment(return_sale: &mut Sale, record: RefundRecord, now: DateTime<Utc>) {
    return_sale.payments.push(Payment {
        id: record.payment_id,
        method: record.method,
        amount_cents: -record.amount.cents(),
        status: PaymentStatus::Completed,
        transaction_id: Some(record.transaction_id),
        card_brand: record.card_brand,
        last4: record.last4,
        tendered_cents: None,
        change_cents: None,
        refund_amount_cents: 0,
        refund_reason: record.reason,
        refund_date: Some(now),
        created_at: now,
    });
    return_sale.updated_at = now;
}

// =============================================================================
// Unit Tests
// =============================================================================
