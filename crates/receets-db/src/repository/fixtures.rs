//! Records for repository tests.

use chrono::Utc;

use receets_core::lifecycle::NewSale;
use receets_core::settlement::Tender;
use receets_core::totals::{build_line_items, LineItemInput};
use receets_core::{
    Address, BusinessType, Customer, Location, Merchant, MerchantRole, MerchantSettings, Money,
    Payment, Sale, SaleType,
};

pub fn merchant(id: &str) -> Merchant {
    Merchant {
        id: id.to_string(),
        business_name: format!("Shop {}", id),
        email: format!("{}@shop.example", id),
        phone: None,
        business_type: BusinessType::Retail,
        tax_id: None,
        return_period_days: 7,
        settings: MerchantSettings::default(),
        gateway_account_id: None,
        active: true,
        role: MerchantRole::Admin,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn location(id: &str, merchant_id: &str) -> Location {
    Location {
        id: id.to_string(),
        merchant_id: merchant_id.to_string(),
        name: "Main Street".to_string(),
        address: Address {
            street: Some("1 Main St".to_string()),
            ..Address::default()
        },
        qr_code: None,
        qr_type: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        version: 0,
    }
}

pub fn customer(id: &str) -> Customer {
    Customer {
        id: id.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("{}@mail.example", id),
        phone: None,
        customer_code: format!("C{:0>8}", id.to_uppercase().replace('-', "")),
        gateway_customer_id: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A draft purchase of 2 x $10.00 plus $1.00 tax.
pub fn sale(id: &str, merchant_id: &str, location_id: &str) -> Sale {
    let items = build_line_items(
        &[LineItemInput::new("p-1", "Coffee", 2, 1000).with_tax(100)],
        SaleType::Purchase,
    )
    .unwrap();

    Sale::new_draft(
        NewSale {
            id: id.to_string(),
            sale_number: format!("SALE-{}", id),
            merchant_id: merchant_id.to_string(),
            location_id: location_id.to_string(),
            customer_id: None,
            customer_code: None,
            sale_type: SaleType::Purchase,
            line_items: items,
            promo_code: None,
            original_sale_id: None,
            notes: None,
            cashier_id: None,
            cashier_name: None,
        },
        Utc::now(),
    )
    .unwrap()
}

pub fn cash_payment(id: &str, transaction_id: &str, cents: i64) -> Payment {
    Tender::Cash {
        tendered_cents: None,
        transaction_id: transaction_id.to_string(),
    }
    .settle(Money::from_cents(cents))
    .unwrap()
    .into_payment(id, Utc::now())
}
