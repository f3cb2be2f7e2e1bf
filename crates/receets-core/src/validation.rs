//! Field checks run before a sale, payment or registry record is touched.
//!
//! Deserialization has already enforced types by the time these run; the
//! database enforces uniqueness afterwards. What sits in between lives here.

use crate::error::ValidationError;
use crate::types::{PromoCode, PromoType};
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY, MAX_RETURN_PERIOD_DAYS, MIN_RETURN_PERIOD_DAYS};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note kept on a sale.
pub const MAX_NOTES_LEN: usize = 1000;

pub const MAX_PROMO_PERCENT: i64 = 100;

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// The product name copied onto a line item: non-blank, at most 200 characters.
///
/// ```rust
/// use receets_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Flat White").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "productName".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "productName".to_string(),
            max: 200,
        });
    }

    Ok(())
}

pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }
    Ok(())
}

/// Catches typos at registration; deliverability is not checked.
///
/// ## Example
/// ```rust
/// use receets_core::validation::validate_email;
///
/// assert!(validate_email("shop@example.com").is_ok());
/// assert!(validate_email("shop.example.com").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_required("email", email)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@domain.tld".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_last4(last4: &str) -> ValidationResult<()> {
    if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "last4".to_string(),
            reason: "must be exactly 4 digits".to_string(),
        });
    }
    Ok(())
}

/// Quantities arrive unsigned (1..=999); returns negate them later.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Zero is allowed (free items, no tax).
pub fn validate_non_negative(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    validate_amount_ceiling(field, cents)
}

/// Payment and refund amounts must be strictly positive.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_amount_ceiling(field, cents)
}

fn validate_amount_ceiling(field: &str, cents: i64) -> ValidationResult<()> {
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

pub fn validate_return_period(days: i64) -> ValidationResult<()> {
    if !(MIN_RETURN_PERIOD_DAYS..=MAX_RETURN_PERIOD_DAYS).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "returnPeriod".to_string(),
            min: MIN_RETURN_PERIOD_DAYS,
            max: MAX_RETURN_PERIOD_DAYS,
        });
    }
    Ok(())
}

/// Percentage promos carry a whole percent (at most 100); fixed promos carry cents.
pub fn validate_promo(promo: &PromoCode) -> ValidationResult<()> {
    validate_required("promoCode.code", &promo.code)?;

    match promo.promo_type {
        PromoType::Percentage => {
            if !(0..=MAX_PROMO_PERCENT).contains(&promo.discount) {
                return Err(ValidationError::OutOfRange {
                    field: "promoCode.discount".to_string(),
                    min: 0,
                    max: MAX_PROMO_PERCENT,
                });
            }
        }
        PromoType::Fixed => validate_non_negative("promoCode.discount", promo.discount)?,
    }
    Ok(())
}
