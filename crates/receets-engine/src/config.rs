//! # Engine Configuration
//!
//! Settings the engine needs at request time. Embedded as the `[engine]`
//! table of the API server's TOML file.
//!
//! ```toml
//! [engine]
//! currency = "usd"
//! receipt_url_prefix = "/receipts"
//! default_return_period_days = 7
//! gateway_timeout_secs = 30
//!
//! [engine.conflict_retry]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! ```

use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use receets_core::{DEFAULT_RETURN_PERIOD_DAYS, MAX_RETURN_PERIOD_DAYS, MIN_RETURN_PERIOD_DAYS};

// =============================================================================
// Conflict Retry
// =============================================================================

/// How often a versioned save is retried after losing a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    20
}

fn default_max_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Backoff schedule for one retried operation.
    ///
    /// Attempts are bounded by `max_attempts`, not by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// ISO currency code sent with payment intents.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Receipts are served at `<prefix>/<sale id>`.
    #[serde(default = "default_receipt_url_prefix")]
    pub receipt_url_prefix: String,

    /// Return period for merchants registered without one.
    #[serde(default = "default_return_period_days")]
    pub default_return_period_days: i64,

    /// Upper bound on a single payment gateway call.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    #[serde(default)]
    pub conflict_retry: RetryConfig,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_receipt_url_prefix() -> String {
    "/receipts".to_string()
}

fn default_return_period_days() -> i64 {
    DEFAULT_RETURN_PERIOD_DAYS
}

fn default_gateway_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            currency: default_currency(),
            receipt_url_prefix: default_receipt_url_prefix(),
            default_return_period_days: default_return_period_days(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            conflict_retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::validation(format!(
                "currency must be a 3-letter ISO code, got '{}'",
                self.currency
            )));
        }
        if !(MIN_RETURN_PERIOD_DAYS..=MAX_RETURN_PERIOD_DAYS)
            .contains(&self.default_return_period_days)
        {
            return Err(EngineError::validation(format!(
                "default_return_period_days must be between {} and {}",
                MIN_RETURN_PERIOD_DAYS, MAX_RETURN_PERIOD_DAYS
            )));
        }
        if self.gateway_timeout_secs == 0 {
            return Err(EngineError::validation("gateway_timeout_secs must be > 0"));
        }
        if self.conflict_retry.max_attempts == 0 {
            return Err(EngineError::validation(
                "conflict_retry.max_attempts must be > 0",
            ));
        }
        if self.conflict_retry.initial_backoff_ms > self.conflict_retry.max_backoff_ms {
            return Err(EngineError::validation(
                "conflict_retry.initial_backoff_ms must not exceed max_backoff_ms",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
