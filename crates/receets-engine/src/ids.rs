//! Generated identifiers: record ids, sale numbers, local transaction ids
//! and customer codes.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const CUSTOMER_CODE_LEN: usize = 8;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// `<PREFIX>-<epoch millis>-<0..999>`, e.g. `SALE-1718000000000-42`.
///
/// Not unique on its own; the caller retries on a unique violation.
pub fn sale_number(prefix: &str, now: DateTime<Utc>) -> String {
    stamped(prefix, now)
}

/// Transaction id for a cash payment recorded without one.
pub fn cash_transaction_id(now: DateTime<Utc>) -> String {
    stamped("CASH", now)
}

/// Transaction id for a card payment recorded without one.
pub fn card_transaction_id(now: DateTime<Utc>) -> String {
    stamped("CARD", now)
}

/// Transaction id for a wallet payment recorded without one.
pub fn wallet_transaction_id(now: DateTime<Utc>) -> String {
    stamped("WALLET", now)
}

/// Transaction id for a manual refund payout.
pub fn refund_transaction_id(now: DateTime<Utc>) -> String {
    stamped("REFUND", now)
}

/// `C` followed by 8 uppercase letters or digits.
pub fn customer_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CUSTOMER_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("C{}", suffix)
}

fn stamped(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{}-{}-{}", prefix, now.timestamp_millis(), suffix)
}
