//! # Totals Calculator
//!
//! Turns caller-supplied line inputs into stored [`LineItem`]s and derives a
//! sale's subtotal, tax, discount and total from them.
//!
//! ## Two Steps, Never Mixed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  LineItemInput[] ──► build_line_items(type) ──► LineItem[] (stored)    │
//! │   (positive magnitudes)      │                                          │
//! │                              └── return? negate qty, tax, discount     │
//! │                                                                         │
//! │  LineItem[] + PromoCode? ──► compute_totals ──► SaleTotals             │
//! │                              │                                          │
//! │                              ├── subtotal = Σ item.total               │
//! │                              ├── tax      = Σ item.tax                 │
//! │                              ├── discount = Σ item.discount + promo    │
//! │                              └── total    = subtotal + tax - discount  │
//! │                                                                         │
//! │  compute_totals never negates, so re-running it over stored items      │
//! │  reproduces the stored totals exactly.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Note that `item.total` already has the line discount taken off and the
//! discount total subtracts it again. Existing receipts depend on this, so
//! the formula is kept as-is.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, BPS_PER_PERCENT};
use crate::types::{LineItem, PromoCode, PromoType, SaleType};
use crate::validation;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// A line as the cashier enters it: always positive magnitudes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItemInput {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax_cents: i64,
}

impl LineItemInput {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Self {
        LineItemInput {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
            tax_cents: 0,
        }
    }

    pub fn with_tax(mut self, tax_cents: i64) -> Self {
        self.tax_cents = tax_cents;
        self
    }

    pub fn with_discount(mut self, discount_cents: i64) -> Self {
        self.discount_cents = discount_cents;
        self
    }
}

/// Derived monetary totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub tax_total_cents: i64,
    pub discount_total_cents: i64,
    pub total_cents: i64,
}

impl SaleTotals {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Line Item Construction
// =============================================================================

/// Validates inputs and builds stored line items for a sale of `sale_type`.
///
/// ## Sign Convention
/// ```text
/// purchase: qty  2, tax  1, discount  0 → total  2*10 - 0    =  20
/// return:   qty -2, tax -1, discount  0 → total -2*10 - 0    = -20
/// ```
pub fn build_line_items(inputs: &[LineItemInput], sale_type: SaleType) -> CoreResult<Vec<LineItem>> {
    if inputs.len() > MAX_LINE_ITEMS {
        return Err(CoreError::TooManyLineItems { max: MAX_LINE_ITEMS });
    }

    let sign = if sale_type == SaleType::Return { -1 } else { 1 };

    inputs
        .iter()
        .map(|input| {
            validate_input(input)?;

            let quantity = input.quantity * sign;
            let tax_cents = input.tax_cents * sign;
            let discount_cents = input.discount_cents * sign;
            let total = Money::from_cents(input.unit_price_cents)
                .multiply_quantity(quantity)?
                .checked_sub(Money::from_cents(discount_cents))?;

            Ok(LineItem {
                product_id: input.product_id.trim().to_string(),
                product_name: input.product_name.trim().to_string(),
                quantity,
                unit_price_cents: input.unit_price_cents,
                discount_cents,
                tax_cents,
                total_cents: total.cents(),
            })
        })
        .collect()
}

fn validate_input(input: &LineItemInput) -> CoreResult<()> {
    validation::validate_required("productId", &input.product_id)?;
    validation::validate_product_name(&input.product_name)?;

    if input.quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: input.quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    validation::validate_quantity(input.quantity)?;
    validation::validate_non_negative("unitPrice", input.unit_price_cents)?;
    validation::validate_non_negative("discount", input.discount_cents)?;
    validation::validate_non_negative("tax", input.tax_cents)?;
    Ok(())
}

// =============================================================================
// Totals
// =============================================================================

/// Derives totals from stored line items and an optional promo code.
///
/// ## Promo Pass
/// - percentage: adds `subtotal × discount / 100` to the discount total
/// - fixed: adds the flat amount
///
/// ## Errors
/// `AmountOverflow` if any sum leaves the `i64` range.
pub fn compute_totals(items: &[LineItem], promo: Option<&PromoCode>) -> CoreResult<SaleTotals> {
    let subtotal = Money::checked_sum(items.iter().map(|i| Money::from_cents(i.total_cents)))?;
    let tax_total = Money::checked_sum(items.iter().map(|i| Money::from_cents(i.tax_cents)))?;
    let mut discount_total =
        Money::checked_sum(items.iter().map(|i| Money::from_cents(i.discount_cents)))?;

    if let Some(promo) = promo {
        discount_total = discount_total.checked_add(promo_discount(subtotal, promo))?;
    }

    let total = subtotal.checked_add(tax_total)?.checked_sub(discount_total)?;
    Ok(SaleTotals {
        subtotal_cents: subtotal.cents(),
        tax_total_cents: tax_total.cents(),
        discount_total_cents: discount_total.cents(),
        total_cents: total.cents(),
    })
}

/// The discount a promo code contributes for the given subtotal.
pub fn promo_discount(subtotal: Money, promo: &PromoCode) -> Money {
    match promo.promo_type {
        PromoType::Percentage => subtotal.percentage(promo.discount * BPS_PER_PERCENT),
        PromoType::Fixed => Money::from_cents(promo.discount),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::MAX_AMOUNT_CENTS;

    fn coffee() -> LineItemInput {
        LineItemInput::new("p-1", "Coffee", 2, 1000).with_tax(100)
    }

    #[test]
    fn test_purchase_totals() {
        let items = build_line_items(&[coffee()], SaleType::Purchase).unwrap();
        let totals = compute_totals(&items, None).unwrap();

        assert_eq!(items[0].total_cents, 2000);
        assert_eq!(totals.subtotal_cents, 2000);
        assert_eq!(totals.tax_total_cents, 100);
        assert_eq!(totals.discount_total_cents, 0);
        assert_eq!(totals.total_cents, 2100);
    }

    #[test]
    fn test_return_items_are_negated() {
        let input = LineItemInput::new("p-1", "Coffee", 2, 1000)
            .with_tax(100)
            .with_discount(50);
        let items = build_line_items(&[input], SaleType::Return).unwrap();

        assert_eq!(items[0].quantity, -2);
        assert_eq!(items[0].tax_cents, -100);
        assert_eq!(items[0].discount_cents, -50);
        assert_eq!(items[0].total_cents, -2000 + 50);

        let totals = compute_totals(&items, None).unwrap();
        assert!(totals.total().is_negative());
        assert_eq!(
            totals.total_cents,
            totals.subtotal_cents + totals.tax_total_cents - totals.discount_total_cents
        );
    }

    #[test]
    fn test_line_discount_counted_in_item_and_discount_total() {
        let input = LineItemInput::new("p-1", "Mug", 1, 1000).with_discount(100);
        let items = build_line_items(&[input], SaleType::Purchase).unwrap();
        let totals = compute_totals(&items, None).unwrap();

        assert_eq!(totals.subtotal_cents, 900);
        assert_eq!(totals.discount_total_cents, 100);
        assert_eq!(totals.total_cents, 800);
    }

    #[test]
    fn test_percentage_promo() {
        let items = build_line_items(&[coffee()], SaleType::Purchase).unwrap();
        let promo = PromoCode {
            code: "TEN".to_string(),
            discount: 10,
            promo_type: PromoType::Percentage,
        };
        let totals = compute_totals(&items, Some(&promo)).unwrap();

        assert_eq!(totals.discount_total_cents, 200);
        assert_eq!(totals.total_cents, 2000 + 100 - 200);
    }

    #[test]
    fn test_percentage_promo_from_wire_is_whole_percent() {
        let items = build_line_items(&[coffee()], SaleType::Purchase).unwrap();
        let promo: PromoCode =
            serde_json::from_str(r#"{"code":"TEN","discount":10,"type":"percentage"}"#).unwrap();
        assert_eq!(promo_discount(Money::from_cents(2000), &promo).cents(), 200);

        let totals = compute_totals(&items, Some(&promo)).unwrap();
        assert_eq!(totals.discount_total_cents, 200);

        let half: PromoCode =
            serde_json::from_str(r#"{"code":"HALF","discount":50,"type":"percentage"}"#).unwrap();
        // 50% of 1005 is 502.5, rounded away from zero
        assert_eq!(promo_discount(Money::from_cents(1005), &half).cents(), 503);
    }

    #[test]
    fn test_fixed_promo() {
        let items = build_line_items(&[coffee()], SaleType::Purchase).unwrap();
        let promo = PromoCode {
            code: "FIVE".to_string(),
            discount: 500,
            promo_type: PromoType::Fixed,
        };
        let totals = compute_totals(&items, Some(&promo)).unwrap();

        assert_eq!(totals.discount_total_cents, 500);
        assert_eq!(totals.total_cents, 1600);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let items = build_line_items(&[coffee(), coffee()], SaleType::Return).unwrap();
        let promo = PromoCode {
            code: "X".to_string(),
            discount: 33,
            promo_type: PromoType::Percentage,
        };
        let first = compute_totals(&items, Some(&promo)).unwrap();
        let second = compute_totals(&items, Some(&promo)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_items_total_zero() {
        assert_eq!(compute_totals(&[], None).unwrap(), SaleTotals::default());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let zero_qty = LineItemInput::new("p-1", "Coffee", 0, 1000);
        assert!(build_line_items(&[zero_qty], SaleType::Purchase).is_err());

        let huge_qty = LineItemInput::new("p-1", "Coffee", 1000, 1000);
        assert!(matches!(
            build_line_items(&[huge_qty], SaleType::Purchase),
            Err(CoreError::QuantityTooLarge { .. })
        ));

        let negative_price = LineItemInput::new("p-1", "Coffee", 1, -5);
        assert!(build_line_items(&[negative_price], SaleType::Purchase).is_err());

        let no_product = LineItemInput::new(" ", "Coffee", 1, 5);
        assert!(build_line_items(&[no_product], SaleType::Purchase).is_err());
    }

    #[test]
    fn test_extreme_prices_are_rejected_not_wrapped() {
        let gold = LineItemInput::new("p-1", "Gold bar", 2, i64::MAX / 2 + 1);
        assert!(matches!(
            build_line_items(&[gold], SaleType::Purchase),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let taxed = LineItemInput::new("p-1", "Gold bar", 1, 100).with_tax(i64::MAX);
        assert!(build_line_items(&[taxed], SaleType::Purchase).is_err());

        let ceiling = LineItemInput::new("p-1", "Gold bar", MAX_ITEM_QUANTITY, MAX_AMOUNT_CENTS)
            .with_tax(MAX_AMOUNT_CENTS);
        let items = build_line_items(&vec![ceiling; MAX_LINE_ITEMS], SaleType::Purchase).unwrap();
        let totals = compute_totals(&items, None).unwrap();
        assert!(totals.total().is_positive());
        assert_eq!(
            totals.total_cents,
            totals.subtotal_cents + totals.tax_total_cents - totals.discount_total_cents
        );
    }

    #[test]
    fn test_overflowing_stored_items_fail_to_total() {
        let mut items = build_line_items(&[coffee(), coffee()], SaleType::Purchase).unwrap();
        items[0].total_cents = i64::MAX;
        assert!(matches!(
            compute_totals(&items, None),
            Err(CoreError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_rejects_too_many_items() {
        let inputs = vec![coffee(); MAX_LINE_ITEMS + 1];
        assert!(matches!(
            build_line_items(&inputs, SaleType::Purchase),
            Err(CoreError::TooManyLineItems { .. })
        ));
    }
}
