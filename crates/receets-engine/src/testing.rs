//! Engine fixtures: an in-memory database seeded through the registry
//! operations, and a scriptable gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::Principal;
use crate::config::{EngineConfig, RetryConfig};
use crate::gateway::{
    GatewayError, GatewayRefund, GatewayResult, IntentStatus, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, RefundStatus, UnconfiguredGateway,
};
use crate::service::payments::PaymentRequest;
use crate::service::registry::{NewLocation, RegisterCustomer, RegisterMerchant};
use crate::service::sales::InitiateSale;
use crate::PosEngine;
use receets_core::totals::LineItemInput;
use receets_core::{MerchantSettings, PaymentMethod, Sale, SaleType};
use receets_db::{Database, DbConfig};

// =============================================================================
// Fake Gateway
// =============================================================================

/// Records every call and answers as scripted.
pub(crate) struct FakeGateway {
    intent_status: IntentStatus,
    refund_status: Mutex<RefundStatus>,
    fail_charges: AtomicBool,
    fail_refunds: AtomicBool,
    delay: Mutex<Option<Duration>>,
    profiles_created: AtomicUsize,
    charges: Mutex<Vec<PaymentIntentRequest>>,
    refunds: Mutex<Vec<(String, i64)>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        FakeGateway::with_intent_status(IntentStatus::Succeeded)
    }
}

impl FakeGateway {
    pub(crate) fn with_intent_status(intent_status: IntentStatus) -> Self {
        FakeGateway {
            intent_status,
            refund_status: Mutex::new(RefundStatus::Succeeded),
            fail_charges: AtomicBool::new(false),
            fail_refunds: AtomicBool::new(false),
            delay: Mutex::new(None),
            profiles_created: AtomicUsize::new(0),
            charges: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_charges(&self) {
        self.fail_charges.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_refunds(&self) {
        self.fail_refunds.store(true, Ordering::SeqCst);
    }

    /// Refunds still return `Ok`, carrying this status.
    pub(crate) fn set_refund_status(&self, status: RefundStatus) {
        *self.refund_status.lock().unwrap() = status;
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn profiles_created(&self) -> usize {
        self.profiles_created.load(Ordering::SeqCst)
    }

    pub(crate) fn charges(&self) -> Vec<PaymentIntentRequest> {
        self.charges.lock().unwrap().clone()
    }

    /// `(payment intent id, amount)` per refund.
    pub(crate) fn refunds(&self) -> Vec<(String, i64)> {
        self.refunds.lock().unwrap().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn ensure_customer_profile(
        &self,
        _email: &str,
        _name: &str,
        _phone: Option<&str>,
    ) -> GatewayResult<String> {
        self.profiles_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_{}", Uuid::new_v4().simple()))
    }

    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent> {
        self.pause().await;
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("card_declined".to_string()));
        }
        self.charges.lock().unwrap().push(request);
        Ok(PaymentIntent {
            id: format!("pi_{}", Uuid::new_v4().simple()),
            status: self.intent_status,
            card_brand: Some("visa".to_string()),
            last4: Some("4242".to_string()),
        })
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_minor: i64,
        _reason: Option<&str>,
        _metadata: HashMap<String, String>,
    ) -> GatewayResult<GatewayRefund> {
        self.pause().await;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("charge_already_refunded".to_string()));
        }
        self.refunds
            .lock()
            .unwrap()
            .push((payment_intent_id.to_string(), amount_minor));
        Ok(GatewayRefund {
            id: format!("re_{}", Uuid::new_v4().simple()),
            status: *self.refund_status.lock().unwrap(),
        })
    }
}

// =============================================================================
// Seeding
// =============================================================================

/// One merchant with one location, and one customer.
#[derive(Debug, Clone)]
pub(crate) struct Seed {
    pub merchant_id: String,
    pub location_id: String,
    pub customer_id: String,
    pub customer_code: String,
}

impl Seed {
    pub(crate) fn merchant(&self) -> Principal {
        Principal::merchant(&self.merchant_id)
    }

    pub(crate) fn customer(&self) -> Principal {
        Principal::customer(&self.customer_id)
    }

    /// A purchase at the seeded location with no customer linked.
    pub(crate) fn purchase(&self, line_items: Vec<LineItemInput>) -> InitiateSale {
        InitiateSale {
            location_id: self.location_id.clone(),
            customer_id: None,
            customer_code: None,
            sale_type: SaleType::Purchase,
            line_items,
            promo_code: None,
            notes: None,
            cashier_id: Some("cashier-1".to_string()),
            cashier_name: Some("Sam".to_string()),
        }
    }
}

/// Two coffees at $10.00 with $1.00 tax: total $21.00.
pub(crate) fn coffee() -> LineItemInput {
    LineItemInput::new("p-coffee", "Coffee beans", 2, 1000).with_tax(100)
}

fn test_config() -> EngineConfig {
    EngineConfig {
        gateway_timeout_secs: 5,
        conflict_retry: RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        },
        ..EngineConfig::default()
    }
}

pub(crate) async fn seed(engine: &PosEngine, settings: MerchantSettings) -> Seed {
    let tag = Uuid::new_v4().simple().to_string();
    let merchant = engine
        .register_merchant(RegisterMerchant {
            business_name: "Bean There".to_string(),
            email: format!("owner-{}@beanthere.example", tag),
            settings: Some(settings),
            gateway_account_id: Some("acct_bean".to_string()),
            ..RegisterMerchant::default()
        })
        .await
        .unwrap();
    let principal = Principal::merchant(&merchant.id);
    let location = engine
        .add_location(
            &principal,
            NewLocation {
                name: "Main Street".to_string(),
                ..NewLocation::default()
            },
        )
        .await
        .unwrap();
    let customer = engine
        .register_customer(RegisterCustomer {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("ada-{}@mail.example", tag),
            ..RegisterCustomer::default()
        })
        .await
        .unwrap();

    Seed {
        merchant_id: merchant.id,
        location_id: location.id,
        customer_id: customer.id,
        customer_code: customer.customer_code,
    }
}

async fn engine_with(gateway: Arc<dyn PaymentGateway>) -> PosEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    PosEngine::new(db, gateway, test_config())
}

pub(crate) async fn seeded_engine() -> (PosEngine, Seed) {
    let engine = engine_with(Arc::new(UnconfiguredGateway)).await;
    let seed = seed(&engine, MerchantSettings::default()).await;
    (engine, seed)
}

pub(crate) async fn seeded_engine_with(gateway: Arc<FakeGateway>) -> (PosEngine, Seed) {
    let engine = engine_with(gateway).await;
    let seed = seed(&engine, MerchantSettings::default()).await;
    (engine, seed)
}

/// Two engines over one store, as when several API processes share a
/// database file. They share no in-process locks, so only versioned saves
/// keep their writes apart.
pub(crate) async fn engines_sharing_store() -> (PosEngine, PosEngine, Seed) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let config = EngineConfig {
        conflict_retry: RetryConfig {
            max_attempts: 50,
            initial_backoff_ms: 1,
            max_backoff_ms: 3,
        },
        ..test_config()
    };
    let first = PosEngine::new(db.clone(), Arc::new(UnconfiguredGateway), config.clone());
    let second = PosEngine::new(db, Arc::new(UnconfiguredGateway), config);
    let seed = seed(&first, MerchantSettings::default()).await;
    (first, second, seed)
}

/// A completed purchase linked to the seeded customer, paid exactly in cash.
pub(crate) async fn paid_in_cash(engine: &PosEngine, seed: &Seed, items: Vec<LineItemInput>) -> Sale {
    let mut request = seed.purchase(items);
    request.customer_id = Some(seed.customer_id.clone());
    let sale = engine.initiate_sale(&seed.merchant(), request).await.unwrap();
    engine
        .apply_payment(
            &seed.merchant(),
            &sale.id,
            PaymentRequest {
                method: PaymentMethod::Cash,
                amount_cents: sale.total_cents,
                transaction_id: Some(format!("CASH-{}", Uuid::new_v4().simple())),
                card_brand: None,
                last4: None,
                tendered_cents: None,
            },
        )
        .await
        .unwrap()
}
