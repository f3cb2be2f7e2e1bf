//! # POS Engine
//!
//! [`PosEngine`] owns the handles every operation needs and groups the
//! operations by concern:
//!
//! - [`sales`] - initiate, update, void, fetch and list sales
//! - [`payments`] - manual tenders, gateway charges and their confirmation
//! - [`returns`] - return sales, refunds and return eligibility
//! - [`receipts`] - receipt documents
//! - [`registry`] - merchants, customers, locations and QR check-in codes
//!
//! Every sale mutation follows the same shape:
//!
//! ```text
//! lock(sale) ─► load ─► check principal ─► [gateway, once] ─► retry { load ─► apply ─► save }
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::error;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{GatewayError, PaymentGateway};
use crate::locks::SaleLocks;
use receets_core::{Customer, Location, Merchant, Sale};
use receets_db::Database;

pub mod payments;
pub mod receipts;
pub mod registry;
pub mod returns;
pub mod sales;

pub use payments::{
    CardPayment, CashPayment, ConfirmGatewayPayment, GatewayPaymentOutcome, GatewayPaymentRequest,
    PaymentRequest,
};
pub use receipts::ReceiptDocument;
pub use registry::{
    LocationUpdate, NewLocation, QrLocation, QrValidation, RegisterCustomer, RegisterMerchant,
};
pub use returns::{
    EligibleReturns, EligibleReturnsQuery, ProcessRefund, ProcessReturn, RefundOutcome,
    RefundSummary,
};
pub use sales::{
    CustomerSalesQuery, InitiateSale, MerchantSalesQuery, Pagination, SalePage, UpdateSale,
};

/// Which gateway call timed out or failed; decides the error kind.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GatewayCall {
    Charge,
    Refund,
}

impl GatewayCall {
    fn into_error(self, message: String) -> EngineError {
        match self {
            GatewayCall::Charge => EngineError::PaymentGateway(message),
            GatewayCall::Refund => EngineError::RefundGateway(message),
        }
    }
}

/// The sale lifecycle engine. Cheap to share behind an `Arc`.
pub struct PosEngine {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    locks: SaleLocks,
    config: EngineConfig,
}

impl PosEngine {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: EngineConfig) -> Self {
        PosEngine {
            db,
            gateway,
            locks: SaleLocks::new(),
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Loading
    // =========================================================================

    pub(crate) async fn load_sale(&self, sale_id: &str) -> EngineResult<Sale> {
        self.db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    pub(crate) async fn load_merchant(&self, merchant_id: &str) -> EngineResult<Merchant> {
        self.db
            .merchants()
            .get_by_id(merchant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Merchant", merchant_id))
    }

    pub(crate) async fn load_location(&self, location_id: &str) -> EngineResult<Location> {
        self.db
            .merchants()
            .get_location(location_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Location", location_id))
    }

    pub(crate) async fn load_customer(&self, customer_id: &str) -> EngineResult<Customer> {
        self.db
            .customers()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer", customer_id))
    }

    /// Loads a location and checks it belongs to `merchant_id`.
    pub(crate) async fn load_merchant_location(
        &self,
        merchant_id: &str,
        location_id: &str,
    ) -> EngineResult<Location> {
        let location = self.load_location(location_id).await?;
        if location.merchant_id != merchant_id {
            // Another merchant's location is reported as absent
            return Err(EngineError::not_found("Location", location_id));
        }
        Ok(location)
    }

    /// Resolves a customer by id, else by code. Neither given → `None`.
    pub(crate) async fn resolve_customer(
        &self,
        customer_id: Option<&str>,
        customer_code: Option<&str>,
    ) -> EngineResult<Option<Customer>> {
        if let Some(id) = customer_id {
            return self.load_customer(id).await.map(Some);
        }
        if let Some(code) = customer_code {
            return self
                .db
                .customers()
                .get_by_code(code)
                .await?
                .map(Some)
                .ok_or_else(|| EngineError::not_found("Customer", code));
        }
        Ok(None)
    }

    // =========================================================================
    // Gateway
    // =========================================================================

    /// Runs one gateway call under the configured timeout.
    pub(crate) async fn call_gateway<T, Fut>(&self, call: GatewayCall, fut: Fut) -> EngineResult<T>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.config.gateway_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(error = %e, ?call, "Gateway call failed");
                Err(call.into_error(e.to_string()))
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.gateway_timeout_secs,
                    ?call,
                    "Gateway call timed out"
                );
                Err(call.into_error(format!(
                    "no response within {}s",
                    self.config.gateway_timeout_secs
                )))
            }
        }
    }
}
