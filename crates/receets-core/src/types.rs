//! # Domain Types
//!
//! Core domain types used throughout Receets.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Merchant     │   │      Sale       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  return_period  │◄──│  merchant_id    │──►│  customer_code  │       │
//! │  │  settings       │   │  sale_number    │   │  gateway id     │       │
//! │  └────────┬────────┘   │  type / status  │   └─────────────────┘       │
//! │           │            │  line_items[]   │                              │
//! │  ┌────────▼────────┐   │  payments[]     │   ┌─────────────────┐       │
//! │  │    Location     │◄──│  location_id    │   │    Payment      │       │
//! │  │  qr_code        │   │  original_sale ─┼─┐ │  amount (±)     │       │
//! │  └─────────────────┘   └─────────────────┘ │ │  refund_amount  │       │
//! │                                 ▲          │ └─────────────────┘       │
//! │                                 └──────────┘                            │
//! │                         (return → original)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sale_number, customer_code, qr_code) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Sale Type
// =============================================================================

/// What kind of transaction a sale records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    #[default]
    Purchase,
    /// Line items carry negative quantities; references an original sale.
    Return,
    Exchange,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::Purchase => "purchase",
            SaleType::Return => "return",
            SaleType::Exchange => "exchange",
        }
    }

    /// Prefix used when numbering sales of this type.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            SaleType::Return => crate::RETURN_NUMBER_PREFIX,
            SaleType::Purchase | SaleType::Exchange => crate::SALE_NUMBER_PREFIX,
        }
    }
}

impl fmt::Display for SaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// ## State Machine
/// ```text
///   draft ──► in_progress ──► completed
///     │            │
///     └────────────┴──► voided
/// ```
/// `refunded` and `partially_refunded` exist for wire compatibility; refund
/// state of a completed sale is projected from its payments instead
/// (see [`Sale::refund_projection`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is being assembled.
    #[default]
    Draft,
    /// At least one payment applied, balance outstanding.
    InProgress,
    /// Paid in full.
    Completed,
    /// Cancelled before payment.
    Voided,
    Refunded,
    PartiallyRefunded,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::InProgress => "in_progress",
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
            SaleStatus::Refunded => "refunded",
            SaleStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    /// Line items, promo and notes may change only in these states.
    pub fn is_mutable(&self) -> bool {
        matches!(self, SaleStatus::Draft | SaleStatus::InProgress)
    }

    /// Payments may be applied in every state except completed and voided.
    pub fn accepts_payment(&self) -> bool {
        !matches!(self, SaleStatus::Completed | SaleStatus::Voided)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method & Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Charged through the payment gateway.
    ReceetsPay,
    ApplePay,
    GooglePay,
    Cash,
    /// Card on an external terminal, recorded manually.
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ReceetsPay => "receets_pay",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }

    #[inline]
    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::ReceetsPay)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Gateway has not confirmed the charge yet.
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    /// Money actually moved: counts toward the amount paid on a sale.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Promo Code
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PromoType {
    Percentage,
    Fixed,
}

/// A promotion applied to the whole sale after line items are totalled.
///
/// `discount` is a whole percent for [`PromoType::Percentage`]
/// (`{"discount": 10, "type": "percentage"}` takes 10% off the subtotal)
/// and cents for [`PromoType::Fixed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromoCode {
    pub code: String,
    pub discount: i64,
    #[serde(rename = "type")]
    pub promo_type: PromoType,
}

// =============================================================================
// Line Item
// =============================================================================

/// A line on a sale. Product data is a snapshot taken when the line was added.
///
/// On return sales `quantity`, `tax_cents` and `discount_cents` are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// `quantity * unit_price - discount`
    pub total_cents: i64,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment (positive amount) or refund (negative amount) on a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub card_brand: Option<String>,
    pub last4: Option<String>,
    /// Cash only: what the customer handed over.
    pub tendered_cents: Option<i64>,
    /// Cash only: change given back.
    pub change_cents: Option<i64>,
    /// Cumulative amount refunded against this payment. Never exceeds `amount_cents`.
    pub refund_amount_cents: i64,
    pub refund_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub refund_date: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn refund_amount(&self) -> Money {
        Money::from_cents(self.refund_amount_cents)
    }

    /// What can still be refunded against this payment.
    pub fn refundable(&self) -> Money {
        if self.amount_cents <= 0 {
            return Money::zero();
        }
        Money::from_cents(self.amount_cents - self.refund_amount_cents)
    }

    /// A refund recorded as a negative payment.
    #[inline]
    pub fn is_refund(&self) -> bool {
        self.amount_cents < 0
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A purchase, return or exchange, with its line items and payments.
///
/// ## Invariant
/// `total == subtotal + tax_total - discount_total`, always recomputed from
/// `line_items` and `promo_code` (see [`crate::totals`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `SALE-<epoch millis>-<3 digits>` or `RET-...`
    pub sale_number: String,
    pub merchant_id: String,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    pub status: SaleStatus,
    pub line_items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub tax_total_cents: i64,
    pub discount_total_cents: i64,
    pub total_cents: i64,
    pub payments: Vec<Payment>,
    pub promo_code: Option<PromoCode>,
    /// Set on return sales only.
    pub original_sale_id: Option<String>,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub cashier_id: Option<String>,
    pub cashier_name: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every save.
    pub version: i64,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        self.sale_type == SaleType::Return
    }

    pub fn payment(&self, payment_id: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    pub fn payment_by_transaction(&self, transaction_id: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
    }
}

/// Refund state of a sale, derived from its payments' refund bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundProjection {
    None,
    PartiallyRefunded,
    Refunded,
}

// =============================================================================
// Merchant
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    #[default]
    Retail,
    Restaurant,
    Service,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MerchantRole {
    #[default]
    Admin,
    Manager,
    Staff,
}

/// Per-merchant behavior switches. All default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct MerchantSettings {
    pub allow_partial_returns: bool,
    pub require_receipt_for_returns: bool,
    /// Refunds without a gateway payment are paid out in cash.
    pub allow_cash_refunds: bool,
    pub notify_customer_on_sale: bool,
}

impl Default for MerchantSettings {
    fn default() -> Self {
        MerchantSettings {
            allow_partial_returns: true,
            require_receipt_for_returns: true,
            allow_cash_refunds: true,
            notify_customer_on_sale: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Merchant {
    pub id: String,
    pub business_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_type: BusinessType,
    pub tax_id: Option<String>,
    /// Days after purchase during which a sale is eligible for return.
    pub return_period_days: i64,
    pub settings: MerchantSettings,
    /// Connected account that receives gateway transfers.
    pub gateway_account_id: Option<String>,
    pub active: bool,
    pub role: MerchantRole,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// A physical store belonging to a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub address: Address,
    /// Opaque check-in code printed as a QR at the counter.
    pub qr_code: Option<String>,
    pub qr_type: Option<QrType>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Bumped on every stored edit; saves check it like [`Sale::version`].
    #[serde(default)]
    pub version: i64,
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Short code a customer shows at checkout to link a sale.
    pub customer_code: String,
    /// Cached gateway customer profile, created on first gateway payment.
    pub gateway_customer_id: Option<String>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// =============================================================================
// QR Check-in
// =============================================================================

/// Which checkout workflow a location QR code starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum QrType {
    #[default]
    Purchase,
    Return,
}

/// Data encoded into a location's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QrCodePayload {
    pub merchant_id: String,
    pub location_id: String,
    #[serde(rename = "type")]
    pub qr_type: QrType,
    pub code: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_status_default_and_guards() {
        assert_eq!(SaleStatus::default(), SaleStatus::Draft);
        assert!(SaleStatus::Draft.is_mutable());
        assert!(SaleStatus::InProgress.is_mutable());
        assert!(!SaleStatus::Completed.is_mutable());
        assert!(SaleStatus::InProgress.accepts_payment());
        assert!(!SaleStatus::Voided.accepts_payment());
        assert!(!SaleStatus::Completed.accepts_payment());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SaleStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(SaleStatus::PartiallyRefunded.to_string(), "partially_refunded");
    }

    #[test]
    fn test_payment_method_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::ReceetsPay).unwrap();
        assert_eq!(json, "\"receets_pay\"");
        assert!(PaymentMethod::ReceetsPay.is_gateway());
        assert!(!PaymentMethod::Cash.is_gateway());
    }

    #[test]
    fn test_payment_status_settled() {
        assert!(PaymentStatus::Completed.is_settled());
        assert!(PaymentStatus::PartiallyRefunded.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
    }

    #[test]
    fn test_promo_code_wire_shape() {
        let promo: PromoCode =
            serde_json::from_str(r#"{"code":"SPRING","discount":10,"type":"percentage"}"#)
                .unwrap();
        assert_eq!(promo.promo_type, PromoType::Percentage);
        assert_eq!(promo.discount, 10);
    }

    #[test]
    fn test_merchant_settings_default_enabled() {
        let settings: MerchantSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.allow_cash_refunds);
        assert!(settings.allow_partial_returns);
    }

    #[test]
    fn test_sale_number_prefix() {
        assert_eq!(SaleType::Purchase.number_prefix(), "SALE");
        assert_eq!(SaleType::Return.number_prefix(), "RET");
    }
}
