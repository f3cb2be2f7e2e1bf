//! # Money
//!
//! Every amount in a Receets ledger is an `i64` count of minor units.
//!
//! ## Signs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  purchase line  qty  2 × $10.00  ──►  +$20.00                           │
//! │  return line    qty -2 × $10.00  ──►  -$20.00                           │
//! │  payment                          ──►  +amount                          │
//! │  refund payment (on return sale)  ──►  -amount                          │
//! │                                                                         │
//! │  gateway calls take the stored cents unchanged: charged == recorded     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything derived from caller input goes through the `checked_*` methods,
//! which report overflow as [`CoreError::AmountOverflow`] instead of
//! wrapping. The plain operators are for amounts already known to be in range.
//!
//! ```rust
//! use receets_core::money::Money;
//!
//! let line = Money::from_cents(1000).multiply_quantity(-2).unwrap();
//! assert_eq!(line.to_string(), "-$20.00");
//! assert_eq!(line.magnitude().to_string(), "$20.00");
//! assert!(Money::from_cents(i64::MAX).multiply_quantity(2).is_err());
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Basis points in 100%.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Basis points in 1%.
pub const BPS_PER_PERCENT: i64 = 100;

const CENTS_PER_UNIT: i64 = 100;

/// A signed amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The unsigned size of an amount; receipts print a return's total this way.
    #[inline]
    pub const fn magnitude(&self) -> Self {
        Money(self.0.abs())
    }

    /// Unit price times a signed line quantity.
    pub fn multiply_quantity(&self, quantity: i64) -> CoreResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| overflow("line total"))
    }

    pub fn checked_add(self, rhs: Money) -> CoreResult<Money> {
        self.0.checked_add(rhs.0).map(Money).ok_or_else(|| overflow("sum"))
    }

    pub fn checked_sub(self, rhs: Money) -> CoreResult<Money> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .ok_or_else(|| overflow("difference"))
    }

    /// Sums amounts, failing on the first overflow.
    pub fn checked_sum<I>(amounts: I) -> CoreResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// `bps` basis points of this amount, rounded half away from zero so a
    /// return's promo mirrors its purchase to the cent.
    ///
    /// ```text
    ///  1005 × 1000 bps =  100.5 →  101
    /// -1005 × 1000 bps = -100.5 → -101
    /// ```
    pub fn percentage(&self, bps: i64) -> Money {
        let product = i128::from(self.0) * i128::from(bps);
        let denominator = i128::from(BPS_DENOMINATOR);
        let half = denominator / 2;
        let rounded = if product >= 0 {
            (product + half) / denominator
        } else {
            (product - half) / denominator
        };
        Money(rounded as i64)
    }

    /// What is left of `self` once `used` is taken off, never below zero.
    ///
    /// Outstanding balances and refundable remainders both read this way.
    #[inline]
    pub fn remaining_after(&self, used: Money) -> Money {
        Money(self.0.saturating_sub(used.0).max(0))
    }
}

fn overflow(operation: &str) -> CoreError {
    CoreError::AmountOverflow {
        operation: operation.to_string(),
    }
}

/// Receipt format: `$21.00`, `-$20.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        let per_unit = CENTS_PER_UNIT as u64;
        write!(f, "{}${}.{:02}", sign, cents / per_unit, cents % per_unit)
    }
}

// =============================================================================
// Operators
// =============================================================================

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_signs() {
        assert_eq!(Money::from_cents(2100).to_string(), "$21.00");
        assert_eq!(Money::from_cents(-2000).to_string(), "-$20.00");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_line_arithmetic() {
        let unit = Money::from_cents(1000);
        assert_eq!(unit.multiply_quantity(2).unwrap().cents(), 2000);
        assert_eq!(unit.multiply_quantity(-2).unwrap().cents(), -2000);
        assert_eq!((-unit.multiply_quantity(2).unwrap() + unit).cents(), -1000);

        let mut paid = Money::zero();
        paid += Money::from_cents(700);
        paid -= Money::from_cents(200);
        assert_eq!(paid.cents(), 500);
    }

    #[test]
    fn test_sum_of_payments() {
        let payments = [Money::from_cents(1000), Money::from_cents(1100), Money::from_cents(-300)];
        let owned: Money = payments.iter().copied().sum();
        let borrowed: Money = payments.iter().sum();
        assert_eq!(owned, borrowed);
        assert_eq!(owned.cents(), 1800);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let price = Money::from_cents(i64::MAX / 2 + 1);
        assert!(matches!(
            price.multiply_quantity(2),
            Err(CoreError::AmountOverflow { .. })
        ));
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_err());
        assert!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)).is_err());
        assert!(Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]).is_err());
        assert_eq!(
            Money::checked_sum([Money::from_cents(1000), Money::from_cents(-300)]).unwrap().cents(),
            700
        );
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        assert_eq!(Money::from_cents(1005).percentage(1000).cents(), 101);
        assert_eq!(Money::from_cents(-1005).percentage(1000).cents(), -101);
        assert_eq!(Money::from_cents(1004).percentage(1000).cents(), 100);
        assert_eq!(Money::from_cents(12345).percentage(BPS_DENOMINATOR).cents(), 12345);
        assert!(Money::from_cents(12345).percentage(0).is_zero());
    }

    #[test]
    fn test_remaining_after() {
        let charged = Money::from_cents(5000);
        assert_eq!(charged.remaining_after(Money::from_cents(2000)).cents(), 3000);
        assert!(charged.remaining_after(Money::from_cents(6000)).is_zero());
    }

    #[test]
    fn test_magnitude() {
        let refund = Money::from_cents(-2000);
        assert!(refund.is_negative());
        assert_eq!(refund.magnitude().cents(), 2000);
        assert_eq!(refund.magnitude(), -refund);
    }

    #[test]
    fn test_serializes_as_bare_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(-150)).unwrap(), "-150");
    }
}
