//! # Receipt Projection
//!
//! Builds the receipt document for a sale from the sale and the records it
//! references. Rendering (PDF, email) happens elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Address, Customer, LineItem, Location, Merchant, Payment, PromoCode, Sale, SaleType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptLocation {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptMerchant {
    pub name: String,
    pub email: String,
    pub location: Option<ReceiptLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptCustomer {
    pub name: String,
    pub email: String,
    pub customer_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptCashier {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A receipt as handed to customers and the receipt app.
///
/// `display_total` is the printed total: `-$20.00` for a return of $20.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Receipt {
    pub sale_number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub merchant: ReceiptMerchant,
    pub customer: Option<ReceiptCustomer>,
    #[serde(rename = "type")]
    pub sale_type: SaleType,
    pub line_items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub tax_total_cents: i64,
    pub discount_total_cents: i64,
    pub total_cents: i64,
    pub display_total: String,
    pub payments: Vec<Payment>,
    pub promo_code: Option<PromoCode>,
    pub cashier: ReceiptCashier,
}

impl Receipt {
    /// `location` is dropped when it belongs to another merchant.
    pub fn build(
        sale: &Sale,
        merchant: &Merchant,
        location: Option<&Location>,
        customer: Option<&Customer>,
    ) -> Receipt {
        let location = location
            .filter(|l| l.merchant_id == merchant.id)
            .map(|l| ReceiptLocation {
                name: l.name.clone(),
                address: l.address.clone(),
            });

        Receipt {
            sale_number: sale.sale_number.clone(),
            date: sale.created_at,
            merchant: ReceiptMerchant {
                name: merchant.business_name.clone(),
                email: merchant.email.clone(),
                location,
            },
            customer: customer.map(|c| ReceiptCustomer {
                name: c.full_name(),
                email: c.email.clone(),
                customer_code: c.customer_code.clone(),
            }),
            sale_type: sale.sale_type,
            line_items: sale.line_items.clone(),
            subtotal_cents: sale.subtotal_cents,
            tax_total_cents: sale.tax_total_cents,
            discount_total_cents: sale.discount_total_cents,
            total_cents: sale.total_cents,
            display_total: sale.total().to_string(),
            payments: sale.payments.clone(),
            promo_code: sale.promo_code.clone(),
            cashier: ReceiptCashier {
                id: sale.cashier_id.clone(),
                name: sale.cashier_name.clone(),
            },
        }
    }
}

/// Receipt URL for a sale under the configured prefix.
pub fn receipt_url(prefix: &str, sale_id: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), sale_id)
}
