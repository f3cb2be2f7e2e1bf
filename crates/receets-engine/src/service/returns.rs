//! # Returns & Refunds
//!
//! A return is a sale of its own, opened against a completed purchase. It
//! is finalised like any sale (status `completed` once its non-positive
//! total is covered) and money goes back in a separate refund step:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  process_return(original) ──► RET sale (draft, negated items)           │
//! │                                     │ update status → completed         │
//! │                                     ▼                                   │
//! │  process_refund(return, amount)                                         │
//! │    lock_pair(return, original) ──► plan_refund                          │
//! │      Gateway ──► create_refund (once) ──► retry {                       │
//! │                    original.payment.refund += amount                    │
//! │                    return.payments += -amount                           │
//! │                    save both in one transaction }                       │
//! │      Manual  ──► allowCashRefunds? ──► retry { return += -amount cash } │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{GatewayCall, PosEngine};
use crate::auth::{Principal, PrincipalKind};
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::retry::retry_on_conflict;
use receets_core::lifecycle::NewSale;
use receets_core::returns::{
    apply_gateway_refund, plan_refund, record_refund_payment, return_window_start,
    validate_return_origin, RefundPlan, RefundRecord,
};
use receets_core::totals::{build_line_items, LineItemInput};
use receets_core::{Money, PaymentMethod, Sale, SaleType};

// =============================================================================
// Requests & Responses
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReturn {
    pub original_sale_id: String,
    /// Items coming back, with positive quantities and prices.
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
    /// Overrides the original's location.
    pub location_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    pub cashier_id: Option<String>,
    pub cashier_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRefund {
    pub amount_cents: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSummary {
    pub id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: String,
    pub reason: Option<String>,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub refund: RefundSummary,
    /// The return sale with the refund payment appended.
    pub sale: Sale,
    pub original_sale: Option<Sale>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleReturnsQuery {
    /// Required for customer principals; merchants always see their own.
    pub merchant_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleReturns {
    pub return_period_days: i64,
    pub sales: Vec<Sale>,
}

// =============================================================================
// Operations
// =============================================================================

impl PosEngine {
    /// Opens a draft return sale against a completed purchase.
    ///
    /// The original sale is not modified.
    ///
    /// ## Errors
    /// - `NotFound` if the original does not exist
    /// - `Permission` unless the principal owns the original's merchant
    /// - `Validation` if the original is not a purchase, or no items are given
    /// - `InvalidState` if the original is not completed
    #[instrument(skip_all, fields(original_sale_id = %request.original_sale_id))]
    pub async fn process_return(
        &self,
        principal: &Principal,
        request: ProcessReturn,
    ) -> EngineResult<Sale> {
        debug!(items = request.line_items.len(), "process_return");
        principal.require_merchant()?;

        let original = self.load_sale(&request.original_sale_id).await?;
        principal.ensure_merchant_owner(&original.merchant_id)?;
        validate_return_origin(&original)?;
        if request.line_items.is_empty() {
            return Err(EngineError::validation(
                "A return needs at least one line item",
            ));
        }

        let location_id = match request.location_id.as_deref() {
            Some(id) => self.load_merchant_location(&original.merchant_id, id).await?.id,
            None => original.location_id.clone(),
        };
        let (customer_id, customer_code) = match self
            .resolve_customer(request.customer_id.as_deref(), request.customer_code.as_deref())
            .await?
        {
            Some(customer) => (Some(customer.id), Some(customer.customer_code)),
            None => (original.customer_id.clone(), original.customer_code.clone()),
        };

        let line_items = build_line_items(&request.line_items, SaleType::Return)?;
        let now = Utc::now();
        let sale = Sale::new_draft(
            NewSale {
                id: ids::new_id(),
                sale_number: ids::sale_number(SaleType::Return.number_prefix(), now),
                merchant_id: original.merchant_id.clone(),
                location_id,
                customer_id,
                customer_code,
                sale_type: SaleType::Return,
                line_items,
                promo_code: None,
                original_sale_id: Some(original.id.clone()),
                notes: request.notes,
                cashier_id: request.cashier_id,
                cashier_name: request.cashier_name,
            },
            now,
        )?;

        let sale = self.insert_numbered(sale).await?;
        info!(
            sale_id = %sale.id,
            original_sale_id = %original.id,
            total_cents = sale.total_cents,
            "Return created"
        );
        Ok(sale)
    }

    /// Pays money back for a completed return sale.
    ///
    /// Gateway-paid originals are refunded through the gateway against the
    /// first payment with a remaining balance. Otherwise the refund is paid
    /// out in cash, which only touches the return sale.
    ///
    /// ## Errors
    /// - `InvalidState` if the sale is not a completed return, every gateway
    ///   payment is exhausted, or cash refunds are disabled for the merchant
    /// - `Validation` for amount ≤ 0 or more than is left to refund
    /// - `RefundGateway` if the processor rejects, times out, or reports the
    ///   refund failed or canceled; nothing is saved
    #[instrument(skip_all, fields(sale_id = %sale_id))]
    pub async fn process_refund(
        &self,
        principal: &Principal,
        sale_id: &str,
        request: ProcessRefund,
    ) -> EngineResult<RefundOutcome> {
        debug!(amount_cents = request.amount_cents, "process_refund");
        principal.require_merchant()?;

        let sale = self.load_sale(sale_id).await?;
        principal.ensure_merchant_owner(&sale.merchant_id)?;
        let original_id = sale.original_sale_id.clone();

        let _guard = self
            .locks
            .lock_pair(sale_id, original_id.as_deref().unwrap_or(sale_id))
            .await;

        let sale = self.load_sale(sale_id).await?;
        let original = match original_id.as_deref() {
            Some(id) => Some(self.load_sale(id).await?),
            None => None,
        };
        let amount = Money::from_cents(request.amount_cents);

        match plan_refund(&sale, original.as_ref(), amount)? {
            RefundPlan::Gateway {
                payment_id,
                transaction_id,
                card_brand,
                last4,
                ..
            } => {
                let original_id = original_id.unwrap_or_default();
                let refund = self
                    .call_gateway(
                        GatewayCall::Refund,
                        self.gateway.create_refund(
                            &transaction_id,
                            amount.cents(),
                            request.reason.as_deref(),
                            HashMap::from([
                                ("returnSaleId".to_string(), sale.id.clone()),
                                ("originalSaleId".to_string(), original_id.clone()),
                                ("merchantId".to_string(), sale.merchant_id.clone()),
                            ]),
                        ),
                    )
                    .await
                    .map_err(|e| {
                        warn!(transaction_id = %transaction_id, "Gateway refused the refund");
                        e
                    })?;

                if !refund.status.accepted() {
                    warn!(
                        refund_id = %refund.id,
                        status = %refund.status,
                        "Gateway did not complete the refund"
                    );
                    return Err(EngineError::RefundGateway(format!(
                        "Refund {} is {}",
                        refund.id, refund.status
                    )));
                }

                let record = RefundRecord {
                    payment_id: ids::new_id(),
                    method: PaymentMethod::ReceetsPay,
                    amount,
                    transaction_id: refund.id.clone(),
                    card_brand,
                    last4,
                    reason: request.reason.clone(),
                };
                let (record, payment_id, reason, original_id) =
                    (&record, payment_id.as_str(), request.reason.as_deref(), original_id.as_str());

                let (sale, original) =
                    retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
                        let mut sale = self.load_sale(sale_id).await?;
                        let mut original = self.load_sale(original_id).await?;
                        let now = Utc::now();
                        apply_gateway_refund(&mut original, payment_id, amount, reason, now)?;
                        record_refund_payment(&mut sale, record.clone(), now);
                        self.db
                            .sales()
                            .save_many(&mut [&mut sale, &mut original])
                            .await?;
                        Ok((sale, original))
                    })
                    .await
                    .map_err(|e| {
                        error!(refund_id = %refund.id, error = %e, "Refunded but could not record it");
                        e
                    })?;

                info!(
                    sale_id = %sale.id,
                    original_sale_id = %original.id,
                    refund_id = %refund.id,
                    amount_cents = amount.cents(),
                    "Gateway refund recorded"
                );
                Ok(RefundOutcome {
                    refund: RefundSummary {
                        id: record.payment_id.clone(),
                        amount_cents: amount.cents(),
                        method: PaymentMethod::ReceetsPay,
                        status: refund.status.to_string(),
                        reason: request.reason,
                        transaction_id: refund.id,
                    },
                    sale,
                    original_sale: Some(original),
                })
            }
            RefundPlan::Manual => {
                let merchant = self.load_merchant(&sale.merchant_id).await?;
                if !merchant.settings.allow_cash_refunds {
                    return Err(EngineError::invalid_state(format!(
                        "Sale {} has no gateway payment to refund and cash refunds are disabled",
                        original_id.as_deref().unwrap_or(sale_id)
                    )));
                }

                let record = RefundRecord {
                    payment_id: ids::new_id(),
                    method: PaymentMethod::Cash,
                    amount,
                    transaction_id: ids::refund_transaction_id(Utc::now()),
                    card_brand: None,
                    last4: None,
                    reason: request.reason.clone(),
                };
                let record_ref = &record;

                let sale =
                    retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
                        let mut sale = self.load_sale(sale_id).await?;
                        plan_refund(&sale, None, amount)?;
                        record_refund_payment(&mut sale, record_ref.clone(), Utc::now());
                        self.db.sales().save(&mut sale).await?;
                        Ok(sale)
                    })
                    .await
                    .map_err(|e| e.with_transaction_id(&record.transaction_id))?;

                info!(
                    sale_id = %sale.id,
                    transaction_id = %record.transaction_id,
                    amount_cents = amount.cents(),
                    "Cash refund recorded"
                );
                Ok(RefundOutcome {
                    refund: RefundSummary {
                        id: record.payment_id,
                        amount_cents: amount.cents(),
                        method: PaymentMethod::Cash,
                        status: "completed".to_string(),
                        reason: record.reason,
                        transaction_id: record.transaction_id,
                    },
                    sale,
                    original_sale: original,
                })
            }
        }
    }

    /// Completed purchases of one customer still inside the merchant's
    /// return period, newest first.
    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn eligible_returns(
        &self,
        principal: &Principal,
        query: EligibleReturnsQuery,
    ) -> EngineResult<EligibleReturns> {
        let (merchant_id, customer_id) = match principal.kind {
            PrincipalKind::Merchant => (principal.id.clone(), query.customer_id),
            PrincipalKind::Customer => {
                if query.customer_id.as_deref().is_some_and(|id| id != principal.id) {
                    return Err(EngineError::permission(
                        "Customers can only list their own purchases",
                    ));
                }
                let merchant_id = query
                    .merchant_id
                    .ok_or_else(|| EngineError::validation("merchantId is required"))?;
                (merchant_id, Some(principal.id.clone()))
            }
        };
        if customer_id.is_none() && query.customer_code.is_none() {
            return Err(EngineError::validation(
                "customerId or customerCode is required",
            ));
        }

        let merchant = self.load_merchant(&merchant_id).await?;
        let since = return_window_start(Utc::now(), merchant.return_period_days);
        let sales = self
            .db
            .sales()
            .eligible_for_return(
                &merchant.id,
                customer_id.as_deref(),
                query.customer_code.as_deref(),
                since,
            )
            .await?;

        debug!(count = sales.len(), %since, "Eligible returns");
        Ok(EligibleReturns {
            return_period_days: merchant.return_period_days,
            sales,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
