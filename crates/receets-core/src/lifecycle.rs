//! # Sale State Machine
//!
//! Guards and transitions for a [`Sale`]. Every method either applies its
//! whole change or returns an error with the sale untouched.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────┐  payment < total  ┌─────────────┐  paid ≥ total ┌─────────┐ │
//! │   │ draft │──────────────────►│ in_progress │──────────────►│completed│ │
//! │   └───┬───┘◄─────────────────►└──────┬──────┘               └────┬────┘ │
//! │       │     (manual request)         │                           │      │
//! │       │        paid ≥ total ─────────┼───────────────────────────┘      │
//! │       │                              │                                  │
//! │       └──────────────┬───────────────┘                                  │
//! │                      ▼                                                  │
//! │                 ┌────────┐   completed + payments → VoidRequiresReturn  │
//! │                 │ voided │                                              │
//! │                 └────────┘                                              │
//! │                                                                         │
//! │   Mutations (items, promo, notes): draft | in_progress only            │
//! │   Payments: anything except completed | voided                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::totals::{compute_totals, SaleTotals};
use crate::types::{
    LineItem, Payment, PaymentStatus, PromoCode, RefundProjection, Sale, SaleStatus, SaleType,
};
use crate::validation;

/// Everything needed to open a new draft sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub id: String,
    pub sale_number: String,
    pub merchant_id: String,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    pub sale_type: SaleType,
    pub line_items: Vec<LineItem>,
    pub promo_code: Option<PromoCode>,
    pub original_sale_id: Option<String>,
    pub notes: Option<String>,
    pub cashier_id: Option<String>,
    pub cashier_name: Option<String>,
}

impl Sale {
    /// Opens a draft sale with totals derived from its line items.
    pub fn new_draft(new: NewSale, now: DateTime<Utc>) -> CoreResult<Sale> {
        if let Some(promo) = &new.promo_code {
            validation::validate_promo(promo)?;
        }
        if let Some(notes) = &new.notes {
            validation::validate_notes(notes)?;
        }

        let mut sale = Sale {
            id: new.id,
            sale_number: new.sale_number,
            merchant_id: new.merchant_id,
            location_id: new.location_id,
            customer_id: new.customer_id,
            customer_code: new.customer_code,
            sale_type: new.sale_type,
            status: SaleStatus::Draft,
            line_items: new.line_items,
            subtotal_cents: 0,
            tax_total_cents: 0,
            discount_total_cents: 0,
            total_cents: 0,
            payments: Vec::new(),
            promo_code: new.promo_code,
            original_sale_id: new.original_sale_id,
            notes: new.notes,
            receipt_url: None,
            cashier_id: new.cashier_id,
            cashier_name: new.cashier_name,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        };
        sale.recompute_totals()?;
        Ok(sale)
    }

    /// Re-derives subtotal, tax, discount and total from stored state.
    pub fn recompute_totals(&mut self) -> CoreResult<()> {
        let totals = compute_totals(&self.line_items, self.promo_code.as_ref())?;
        self.store_totals(totals);
        Ok(())
    }

    fn store_totals(&mut self, totals: SaleTotals) {
        self.subtotal_cents = totals.subtotal_cents;
        self.tax_total_cents = totals.tax_total_cents;
        self.discount_total_cents = totals.discount_total_cents;
        self.total_cents = totals.total_cents;
    }

    /// Stores new totals and, once money has been taken, re-derives status
    /// against them: shrinking a part-paid sale to what is already paid
    /// completes it, growing it keeps it `in_progress`.
    fn retotal(&mut self, totals: SaleTotals, now: DateTime<Utc>) {
        self.store_totals(totals);
        if self.payments.iter().any(|p| p.status.is_settled()) {
            self.settle_status(now);
        } else {
            self.updated_at = now;
        }
    }

    /// Fails unless line items, promo and notes may still change.
    pub fn ensure_mutable(&self, operation: &str) -> CoreResult<()> {
        if !self.status.is_mutable() {
            return Err(CoreError::invalid_status(&self.id, self.status, operation));
        }
        Ok(())
    }

    pub fn replace_line_items(&mut self, items: Vec<LineItem>, now: DateTime<Utc>) -> CoreResult<()> {
        self.revise_pricing(Some(items), None, now)
    }

    pub fn set_promo_code(&mut self, promo: Option<PromoCode>, now: DateTime<Utc>) -> CoreResult<()> {
        self.revise_pricing(None, Some(promo), now)
    }

    /// Replaces line items and/or the promo code in one step, then re-totals
    /// once. `promo` is `Some(None)` to remove the code.
    ///
    /// Nothing is changed if any check fails.
    pub fn revise_pricing(
        &mut self,
        items: Option<Vec<LineItem>>,
        promo: Option<Option<PromoCode>>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if items.is_some() {
            self.ensure_mutable("change line items")?;
        }
        if let Some(promo) = &promo {
            self.ensure_mutable("change promo code")?;
            if let Some(promo) = promo {
                validation::validate_promo(promo)?;
            }
        }
        if items.is_none() && promo.is_none() {
            return Ok(());
        }

        let items_ref = items.as_deref().unwrap_or(&self.line_items);
        let promo_ref = match &promo {
            Some(promo) => promo.as_ref(),
            None => self.promo_code.as_ref(),
        };
        let totals = compute_totals(items_ref, promo_ref)?;

        if let Some(items) = items {
            self.line_items = items;
        }
        if let Some(promo) = promo {
            self.promo_code = promo;
        }
        self.retotal(totals, now);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_mutable("change notes")?;
        if let Some(notes) = &notes {
            validation::validate_notes(notes)?;
        }
        self.notes = notes;
        self.updated_at = now;
        Ok(())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Sum of payments whose money actually moved. Pending and failed do not count.
    pub fn total_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.status.is_settled())
            .map(Payment::amount)
            .sum()
    }

    /// What is still owed, never negative.
    pub fn balance_due(&self) -> Money {
        self.total().remaining_after(self.total_paid())
    }

    /// Appends a payment and moves the sale to `in_progress` or `completed`.
    ///
    /// ## Preconditions
    /// - status is neither completed nor voided
    /// - 0 < amount <= `MAX_AMOUNT_CENTS`
    ///
    /// Duplicate submissions are not detected here; the store rejects a
    /// repeated transaction id.
    pub fn apply_payment(&mut self, payment: Payment, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.accepts_payment() {
            return Err(CoreError::invalid_status(&self.id, self.status, "accept a payment"));
        }
        if payment.amount_cents <= 0 {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        validation::validate_positive_amount("amount", payment.amount_cents)?;
        self.total_paid().checked_add(payment.amount())?;

        self.payments.push(payment);
        self.settle_status(now);
        Ok(())
    }

    /// Marks a pending payment completed once the gateway confirms it.
    ///
    /// Returns `false` when the payment was already settled, so confirming
    /// twice is harmless.
    pub fn confirm_payment(&mut self, transaction_id: &str, now: DateTime<Utc>) -> CoreResult<bool> {
        let sale_id = self.id.clone();
        let status = self.status;
        let payment = self
            .payments
            .iter_mut()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .ok_or_else(|| CoreError::PaymentNotFound(transaction_id.to_string()))?;

        match payment.status {
            PaymentStatus::Pending => {}
            s if s.is_settled() => return Ok(false),
            _ => {
                return Err(CoreError::InvalidOperation(format!(
                    "payment {} on sale {} is {} and cannot be confirmed",
                    transaction_id, sale_id, payment.status
                )))
            }
        }
        if status == SaleStatus::Voided {
            return Err(CoreError::invalid_status(sale_id, status, "confirm a payment"));
        }

        payment.status = PaymentStatus::Completed;
        if self.status.accepts_payment() {
            self.settle_status(now);
        } else {
            self.updated_at = now;
        }
        Ok(true)
    }

    fn settle_status(&mut self, now: DateTime<Utc>) {
        if self.total_paid() >= self.total() {
            self.status = SaleStatus::Completed;
            self.completed_at = Some(now);
        } else {
            self.status = SaleStatus::InProgress;
        }
        self.updated_at = now;
    }

    // =========================================================================
    // Status Requests & Void
    // =========================================================================

    /// Applies a status requested through update-sale.
    ///
    /// ## Allowed Requests
    /// - `draft` ↔ `in_progress` while mutable
    /// - `completed` while mutable and paid in full (finalizes return sales,
    ///   whose total is at or below zero)
    /// - `voided` follows [`Sale::void`]
    pub fn request_status(&mut self, target: SaleStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if target == self.status {
            return Ok(());
        }

        match target {
            SaleStatus::Draft | SaleStatus::InProgress => {
                self.ensure_mutable("change status")?;
                self.status = target;
            }
            SaleStatus::Completed => {
                self.ensure_mutable("complete")?;
                if self.total_paid() < self.total() {
                    return Err(CoreError::InvalidOperation(format!(
                        "Sale {} has {} outstanding and cannot be completed",
                        self.id,
                        self.balance_due()
                    )));
                }
                self.status = SaleStatus::Completed;
                self.completed_at = Some(now);
            }
            SaleStatus::Voided => return self.void(None, now),
            SaleStatus::Refunded | SaleStatus::PartiallyRefunded => {
                return Err(CoreError::InvalidOperation(format!(
                    "{} is derived from refunds and cannot be requested",
                    target
                )))
            }
        }

        self.updated_at = now;
        Ok(())
    }

    /// Voids the sale and appends `Voided: <reason>` to its notes.
    pub fn void(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> CoreResult<()> {
        match self.status {
            SaleStatus::Draft | SaleStatus::InProgress => {}
            SaleStatus::Completed if self.payments.is_empty() => {}
            SaleStatus::Completed => {
                return Err(CoreError::VoidRequiresReturn {
                    sale_id: self.id.clone(),
                })
            }
            status => return Err(CoreError::invalid_status(&self.id, status, "void")),
        }

        let line = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("Voided: {}", reason),
            None => "Voided".to_string(),
        };
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
            _ => line,
        });
        self.status = SaleStatus::Voided;
        self.updated_at = now;
        Ok(())
    }

    /// Refund state derived from the refund bookkeeping on positive payments.
    pub fn refund_projection(&self) -> RefundProjection {
        let charges: Vec<&Payment> = self.payments.iter().filter(|p| p.amount_cents > 0).collect();
        let refunded: i64 = charges.iter().map(|p| p.refund_amount_cents).sum();
        let charged: i64 = charges.iter().map(|p| p.amount_cents).sum();

        if refunded <= 0 {
            RefundProjection::None
        } else if refunded >= charged {
            RefundProjection::Refunded
        } else {
            RefundProjection::PartiallyRefunded
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
