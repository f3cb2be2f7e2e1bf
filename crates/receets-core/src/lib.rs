//! # receets-core: Pure Business Logic for Receets
//!
//! The sale lifecycle and payment/refund reconciliation rules, as pure
//! functions over plain data. Nothing in this crate touches a database, a
//! clock it was not handed, or the payment gateway.
//!
//! ```text
//! apps/api ──► receets-engine ──► receets-core ◄── receets-db
//!               (locks, retry,     (this crate)     (rows in, rows out)
//!                gateway calls)
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, LineItem, Payment, Merchant, Customer)
//! - [`money`] - Money type with integer arithmetic
//! - [`totals`] - Line item construction and the totals calculator
//! - [`lifecycle`] - Sale state machine guards and transitions
//! - [`settlement`] - Per-method payment settlement (`Tender`)
//! - [`returns`] - Return sale construction and refund reconciliation
//! - [`receipt`] - Receipt document projection
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use receets_core::totals::{build_line_items, compute_totals, LineItemInput};
//! use receets_core::SaleType;
//!
//! let items = build_line_items(
//!     &[LineItemInput::new("sku-1", "Coffee", 2, 1000).with_tax(100)],
//!     SaleType::Purchase,
//! )
//! .unwrap();
//!
//! let totals = compute_totals(&items, None).unwrap();
//! assert_eq!(totals.subtotal_cents, 2000);
//! assert_eq!(totals.total_cents, 2100);
//! ```

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod receipt;
pub mod returns;
pub mod settlement;
pub mod totals;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Maximum line items allowed on a single sale.
pub const MAX_LINE_ITEMS: usize = 100;

/// Largest quantity a single line may carry, before the return sign is applied.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single amount (price, tax, discount, payment) accepted from a
/// caller: $100,000,000.00. 999 units on each of 100 lines stays well inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Return window applied when a merchant has not configured one.
pub const DEFAULT_RETURN_PERIOD_DAYS: i64 = 7;

/// Bounds for a merchant's configurable return window.
pub const MIN_RETURN_PERIOD_DAYS: i64 = 1;
pub const MAX_RETURN_PERIOD_DAYS: i64 = 90;

/// Prefix of sale numbers for purchases.
pub const SALE_NUMBER_PREFIX: &str = "SALE";

/// Prefix of sale numbers for return sales.
pub const RETURN_NUMBER_PREFIX: &str = "RET";
