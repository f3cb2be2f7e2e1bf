//! # Payment Operations
//!
//! ## Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  apply_payment / cash_payment / card_payment                            │
//! │    request ──► Tender ──► lock ──► retry { load ─► settle ─► save }     │
//! │                                                                         │
//! │  gateway_payment                                                        │
//! │    lock ──► load ──► customer profile (CAS cached)                      │
//! │         ──► create_payment_intent (timeout, once)                       │
//! │         ──► retry { load ─► settle(GatewayCharge) ─► save }             │
//! │                                                                         │
//! │  confirm_gateway_payment                                                │
//! │    lock ──► retry { load ─► pending → completed ─► save }               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{GatewayCall, PosEngine};
use crate::auth::{Principal, PrincipalKind};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{IntentStatus, PaymentIntent, PaymentIntentRequest};
use crate::ids;
use crate::retry::retry_on_conflict;
use receets_core::settlement::{GatewayCharge, Tender};
use receets_core::{Customer, Money, PaymentMethod, Sale};

// =============================================================================
// Requests & Responses
// =============================================================================

/// A payment taken at the register.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub transaction_id: Option<String>,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
    /// Cash handed over; defaults to the exact amount.
    pub tendered_cents: Option<i64>,
}

impl PaymentRequest {
    /// Picks the tender for this method, drawing a transaction id if none was given.
    fn into_tender(self, now: DateTime<Utc>) -> EngineResult<Tender> {
        let tender = match self.method {
            PaymentMethod::Cash => Tender::Cash {
                tendered_cents: self.tendered_cents,
                transaction_id: self
                    .transaction_id
                    .unwrap_or_else(|| ids::cash_transaction_id(now)),
            },
            PaymentMethod::Card => Tender::Card {
                card_brand: self.card_brand,
                last4: self.last4,
                transaction_id: self
                    .transaction_id
                    .unwrap_or_else(|| ids::card_transaction_id(now)),
            },
            method @ (PaymentMethod::ApplePay | PaymentMethod::GooglePay | PaymentMethod::Other) => {
                Tender::Wallet {
                    method,
                    transaction_id: self
                        .transaction_id
                        .unwrap_or_else(|| ids::wallet_transaction_id(now)),
                }
            }
            PaymentMethod::ReceetsPay => {
                return Err(EngineError::validation(
                    "receets_pay payments are charged through the gateway payment operation",
                ))
            }
        };
        Ok(tender)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashPayment {
    pub sale_id: String,
    pub amount_cents: i64,
    pub tendered_cents: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayment {
    pub sale_id: String,
    pub amount_cents: i64,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPaymentRequest {
    pub sale_id: String,
    /// The processor's id for the saved card or wallet.
    pub payment_method_id: String,
    /// Defaults to the sale's customer.
    pub customer_id: Option<String>,
    /// Defaults to the outstanding balance.
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmGatewayPayment {
    pub sale_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPaymentOutcome {
    pub sale: Sale,
    pub payment_intent: PaymentIntent,
}

// =============================================================================
// Operations
// =============================================================================

impl PosEngine {
    /// Records a payment taken at the register and advances the sale.
    ///
    /// ## Errors
    /// - `Validation` for amount ≤ 0, short cash, or a `receets_pay` method
    /// - `InvalidState` if the sale is completed or voided
    /// - `DuplicatePayment` if the transaction id was recorded before
    #[instrument(skip_all, fields(sale_id = %sale_id, method = %request.method))]
    pub async fn apply_payment(
        &self,
        principal: &Principal,
        sale_id: &str,
        request: PaymentRequest,
    ) -> EngineResult<Sale> {
        debug!(amount_cents = request.amount_cents, "apply_payment");
        principal.require_merchant()?;

        let amount = Money::from_cents(request.amount_cents);
        if !amount.is_positive() {
            return Err(EngineError::validation("amount must be greater than zero"));
        }
        let tender = request.into_tender(Utc::now())?;
        let transaction_id = transaction_id_of(&tender).to_string();
        let tender = &tender;

        let _guard = self.locks.lock(sale_id).await;
        let sale = retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
            let mut sale = self.load_sale(sale_id).await?;
            principal.ensure_merchant_owner(&sale.merchant_id)?;

            let now = Utc::now();
            let payment = tender.clone().settle(amount)?.into_payment(ids::new_id(), now);
            sale.apply_payment(payment, now)?;
            self.db.sales().save(&mut sale).await?;
            Ok(sale)
        })
        .await
        .map_err(|e| e.with_transaction_id(&transaction_id))?;

        info!(
            sale_id = %sale.id,
            transaction_id = %transaction_id,
            amount_cents = amount.cents(),
            status = %sale.status,
            paid_cents = sale.total_paid().cents(),
            "Payment applied"
        );
        Ok(sale)
    }

    pub async fn cash_payment(
        &self,
        principal: &Principal,
        request: CashPayment,
    ) -> EngineResult<Sale> {
        self.apply_payment(
            principal,
            &request.sale_id,
            PaymentRequest {
                method: PaymentMethod::Cash,
                amount_cents: request.amount_cents,
                transaction_id: None,
                card_brand: None,
                last4: None,
                tendered_cents: request.tendered_cents,
            },
        )
        .await
    }

    /// Records a card payment taken on an external terminal.
    pub async fn card_payment(
        &self,
        principal: &Principal,
        request: CardPayment,
    ) -> EngineResult<Sale> {
        self.apply_payment(
            principal,
            &request.sale_id,
            PaymentRequest {
                method: PaymentMethod::Card,
                amount_cents: request.amount_cents,
                transaction_id: request.transaction_id,
                card_brand: request.card_brand,
                last4: request.last4,
                tendered_cents: None,
            },
        )
        .await
    }

    /// Charges the customer's saved payment method through the gateway.
    ///
    /// The sale stays locked across the gateway call, so a second request
    /// for the same sale sees the first charge before deciding its amount.
    /// A charge the processor reports as failed leaves the sale unchanged.
    #[instrument(skip_all, fields(sale_id = %request.sale_id))]
    pub async fn gateway_payment(
        &self,
        principal: &Principal,
        request: GatewayPaymentRequest,
    ) -> EngineResult<GatewayPaymentOutcome> {
        debug!(amount_cents = ?request.amount_cents, "gateway_payment");
        if request.payment_method_id.trim().is_empty() {
            return Err(EngineError::validation("paymentMethodId is required"));
        }
        let sale_id = request.sale_id.as_str();

        let _guard = self.locks.lock(sale_id).await;
        let sale = self.load_sale(sale_id).await?;
        principal.ensure_can_view(&sale)?;
        if !sale.status.accepts_payment() {
            return Err(EngineError::invalid_state(format!(
                "Sale {} is {}, cannot accept a payment",
                sale.id, sale.status
            )));
        }

        let amount = match request.amount_cents {
            Some(cents) => Money::from_cents(cents),
            None => sale.balance_due(),
        };
        if !amount.is_positive() {
            return Err(EngineError::validation("amount must be greater than zero"));
        }

        let customer = self.payment_customer(principal, &sale, request.customer_id.as_deref()).await?;
        let merchant = self.load_merchant(&sale.merchant_id).await?;
        let profile_id = self.ensure_gateway_profile(&customer).await?;

        let intent = self
            .call_gateway(
                GatewayCall::Charge,
                self.gateway.create_payment_intent(PaymentIntentRequest {
                    amount_minor: amount.cents(),
                    currency: self.config.currency.clone(),
                    customer_profile_id: profile_id,
                    payment_method_id: request.payment_method_id.clone(),
                    description: format!("Payment for sale {}", sale.sale_number),
                    metadata: HashMap::from([
                        ("saleId".to_string(), sale.id.clone()),
                        ("saleNumber".to_string(), sale.sale_number.clone()),
                        ("merchantId".to_string(), sale.merchant_id.clone()),
                        ("customerId".to_string(), customer.id.clone()),
                    ]),
                    transfer_destination: merchant.gateway_account_id.clone(),
                }),
            )
            .await?;

        if intent.status == IntentStatus::Failed {
            warn!(intent_id = %intent.id, "Gateway declined the charge");
            return Err(EngineError::PaymentGateway(format!(
                "Payment {} failed",
                intent.id
            )));
        }

        let charge = GatewayCharge {
            intent_id: intent.id.clone(),
            succeeded: intent.status.succeeded(),
            card_brand: intent.card_brand.clone(),
            last4: intent.last4.clone(),
        };
        let charge = &charge;

        let sale = retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
            let mut sale = self.load_sale(sale_id).await?;
            let now = Utc::now();
            let payment = Tender::Gateway(charge.clone())
                .settle(amount)?
                .into_payment(ids::new_id(), now);
            sale.apply_payment(payment, now)?;
            self.db.sales().save(&mut sale).await?;
            Ok(sale)
        })
        .await
        .map_err(|e| {
            // The processor holds funds the ledger does not show
            error!(intent_id = %intent.id, error = %e, "Charged but could not record payment");
            e.with_transaction_id(&intent.id)
        })?;

        info!(
            sale_id = %sale.id,
            intent_id = %intent.id,
            amount_cents = amount.cents(),
            status = %sale.status,
            "Gateway payment recorded"
        );
        Ok(GatewayPaymentOutcome {
            sale,
            payment_intent: intent,
        })
    }

    /// Settles a pending gateway payment. Confirming a settled one is a no-op.
    #[instrument(skip_all, fields(sale_id = %request.sale_id))]
    pub async fn confirm_gateway_payment(
        &self,
        principal: &Principal,
        request: ConfirmGatewayPayment,
    ) -> EngineResult<Sale> {
        let sale_id = request.sale_id.as_str();
        let transaction_id = request.transaction_id.as_str();

        let _guard = self.locks.lock(sale_id).await;
        let (sale, changed) =
            retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
                let mut sale = self.load_sale(sale_id).await?;
                principal.ensure_can_view(&sale)?;
                let changed = sale.confirm_payment(transaction_id, Utc::now())?;
                if changed {
                    self.db.sales().save(&mut sale).await?;
                }
                Ok((sale, changed))
            })
            .await?;

        if changed {
            info!(sale_id = %sale.id, transaction_id, status = %sale.status, "Gateway payment confirmed");
        } else {
            debug!(transaction_id, "Gateway payment already settled");
        }
        Ok(sale)
    }

    // =========================================================================
    // Customer Profiles
    // =========================================================================

    /// The customer paying for `sale`: the requested one, else the sale's,
    /// else the paying customer principal.
    async fn payment_customer(
        &self,
        principal: &Principal,
        sale: &Sale,
        requested: Option<&str>,
    ) -> EngineResult<Customer> {
        let customer_id = requested
            .or(sale.customer_id.as_deref())
            .or(match principal.kind {
                PrincipalKind::Customer => Some(principal.id.as_str()),
                PrincipalKind::Merchant => None,
            })
            .ok_or_else(|| EngineError::validation("A customer is required for gateway payments"))?;

        if principal.kind == PrincipalKind::Customer && principal.id != customer_id {
            return Err(EngineError::permission(
                "Customers can only pay with their own payment methods",
            ));
        }
        self.load_customer(customer_id).await
    }

    /// Returns the customer's gateway profile id, creating and caching it once.
    pub(crate) async fn ensure_gateway_profile(&self, customer: &Customer) -> EngineResult<String> {
        if let Some(id) = &customer.gateway_customer_id {
            return Ok(id.clone());
        }

        let created = self
            .call_gateway(
                GatewayCall::Charge,
                self.gateway.ensure_customer_profile(
                    &customer.email,
                    &customer.full_name(),
                    customer.phone.as_deref(),
                ),
            )
            .await?;

        let stored = self
            .db
            .customers()
            .set_gateway_customer_id_if_absent(&customer.id, &created, Utc::now())
            .await?;
        if stored {
            debug!(customer_id = %customer.id, "Cached gateway profile");
            return Ok(created);
        }

        // Another request cached a profile first; use theirs
        let current = self.load_customer(&customer.id).await?;
        Ok(current.gateway_customer_id.unwrap_or(created))
    }
}

fn transaction_id_of(tender: &Tender) -> &str {
    match tender {
        Tender::Cash { transaction_id, .. }
        | Tender::Card { transaction_id, .. }
        | Tender::Wallet { transaction_id, .. } => transaction_id,
        Tender::Gateway(charge) => &charge.intent_id,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
