//! # receets-engine: Sale Lifecycle Orchestration
//!
//! Runs every request-level operation of Receets against the database,
//! with the guarantees the pure core cannot give on its own.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  apps/api handler                                                       │
//! │       │  engine.apply_payment(&principal, sale_id, request)             │
//! │       ▼                                                                 │
//! │  PosEngine                                                              │
//! │  ├── SaleLocks::lock(sale_id)      one writer per sale in this process  │
//! │  ├── PaymentGateway (timeout)      only outside the retry loop          │
//! │  └── retry_on_conflict             re-read, re-apply, save(version)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  receets-core  (Sale::apply_payment, plan_refund, ...)                  │
//! │  receets-db    (SaleRepository::save / save_many)                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handles are injected: build a [`PosEngine`] from a [`receets_db::Database`],
//! an `Arc<dyn PaymentGateway>` and an [`EngineConfig`].

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod locks;
pub mod retry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{Principal, PrincipalKind};
pub use config::{EngineConfig, RetryConfig};
pub use error::{EngineError, EngineResult};
pub use gateway::{
    GatewayError, GatewayRefund, IntentStatus, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, RefundStatus, UnconfiguredGateway,
};
pub use service::PosEngine;
