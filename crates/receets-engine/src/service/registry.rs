//! # Registry
//!
//! Merchants, their locations, customers, and the QR check-in codes that
//! point a phone at a location.
//!
//! ```text
//! generate_qr_code(location) ──► code (uuid) stored on the location
//!                                   │
//!        customer scans ────────────┘
//!                                   ▼
//! validate_qr_code(code) ──► merchant + location (must be active)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::PosEngine;
use crate::auth::{Principal, PrincipalKind};
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::retry::retry_on_conflict;
use receets_core::validation::{validate_email, validate_required, validate_return_period};
use receets_core::{
    Address, BusinessType, Customer, Location, Merchant, MerchantRole, MerchantSettings, QrCodePayload,
    QrType,
};

// =============================================================================
// Requests & Responses
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMerchant {
    pub business_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub business_type: BusinessType,
    pub tax_id: Option<String>,
    /// Days a purchase stays returnable; defaults to the engine setting.
    #[serde(rename = "returnPeriod")]
    pub return_period_days: Option<i64>,
    pub settings: Option<MerchantSettings>,
    pub gateway_account_id: Option<String>,
    #[serde(default)]
    pub role: MerchantRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Generated when absent.
    pub customer_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub address: Option<Address>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrLocation {
    pub id: String,
    pub name: String,
    pub address: Address,
}

/// What a scanned QR code resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrValidation {
    pub merchant_id: String,
    pub merchant_name: String,
    pub location: QrLocation,
    #[serde(rename = "type")]
    pub qr_type: QrType,
}

// =============================================================================
// Operations
// =============================================================================

impl PosEngine {
    /// Creates a merchant account.
    ///
    /// ## Errors
    /// - `Validation` for a missing name, malformed or taken email, or a
    ///   return period outside 1..=365 days
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register_merchant(&self, request: RegisterMerchant) -> EngineResult<Merchant> {
        validate_required("businessName", &request.business_name)?;
        validate_email(&request.email)?;
        let return_period_days = request
            .return_period_days
            .unwrap_or(self.config.default_return_period_days);
        validate_return_period(return_period_days)?;

        let now = Utc::now();
        let merchant = Merchant {
            id: ids::new_id(),
            business_name: request.business_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: request.phone,
            business_type: request.business_type,
            tax_id: request.tax_id,
            return_period_days,
            settings: request.settings.unwrap_or_default(),
            gateway_account_id: request.gateway_account_id,
            active: true,
            role: request.role,
            created_at: now,
            updated_at: now,
        };
        self.db.merchants().insert(&merchant).await?;

        info!(merchant_id = %merchant.id, "Merchant registered");
        Ok(merchant)
    }

    /// Creates a customer account with a checkout code.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register_customer(&self, request: RegisterCustomer) -> EngineResult<Customer> {
        validate_required("firstName", &request.first_name)?;
        validate_required("lastName", &request.last_name)?;
        validate_email(&request.email)?;

        let customer_code = match request.customer_code {
            Some(code) => {
                validate_required("customerCode", &code)?;
                code.trim().to_uppercase()
            }
            None => ids::customer_code(),
        };

        let now = Utc::now();
        let customer = Customer {
            id: ids::new_id(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: request.phone,
            customer_code,
            gateway_customer_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.customers().insert(&customer).await?;

        info!(customer_id = %customer.id, customer_code = %customer.customer_code, "Customer registered");
        Ok(customer)
    }

    pub async fn get_merchant(&self, principal: &Principal, merchant_id: &str) -> EngineResult<Merchant> {
        principal.ensure_merchant_owner(merchant_id)?;
        self.load_merchant(merchant_id).await
    }

    /// A customer principal may read only their own record; merchants may
    /// look customers up to link them to a sale.
    pub async fn get_customer(&self, principal: &Principal, customer_id: &str) -> EngineResult<Customer> {
        if principal.kind == PrincipalKind::Customer && principal.id != customer_id {
            return Err(EngineError::permission("Not authorized for this customer"));
        }
        self.load_customer(customer_id).await
    }

    pub async fn list_locations(&self, principal: &Principal) -> EngineResult<Vec<Location>> {
        let merchant_id = principal.require_merchant()?;
        Ok(self.db.merchants().list_locations(merchant_id).await?)
    }

    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn add_location(&self, principal: &Principal, request: NewLocation) -> EngineResult<Location> {
        let merchant_id = principal.require_merchant()?;
        validate_required("name", &request.name)?;
        let merchant = self.load_merchant(merchant_id).await?;

        let now = Utc::now();
        let location = Location {
            id: ids::new_id(),
            merchant_id: merchant.id,
            name: request.name.trim().to_string(),
            address: request.address,
            qr_code: None,
            qr_type: None,
            active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.db.merchants().insert_location(&location).await?;

        info!(location_id = %location.id, merchant_id = %location.merchant_id, "Location added");
        Ok(location)
    }

    #[instrument(skip_all, fields(location_id = %location_id))]
    pub async fn update_location(
        &self,
        principal: &Principal,
        location_id: &str,
        update: LocationUpdate,
    ) -> EngineResult<Location> {
        let merchant_id = principal.require_merchant()?;
        if let Some(name) = &update.name {
            validate_required("name", name)?;
        }
        let update = &update;

        // Fields absent from the request keep whatever the latest row holds.
        let location = retry_on_conflict(&self.config.conflict_retry, location_id, move || async move {
            let mut location = self.load_merchant_location(merchant_id, location_id).await?;
            if let Some(name) = &update.name {
                location.name = name.trim().to_string();
            }
            if let Some(address) = &update.address {
                location.address = address.clone();
            }
            if let Some(active) = update.active {
                location.active = active;
            }
            location.updated_at = Utc::now();
            self.db.merchants().update_location(&mut location).await?;
            Ok(location)
        })
        .await?;

        info!(location_id = %location.id, active = location.active, "Location updated");
        Ok(location)
    }

    // =========================================================================
    // QR Codes
    // =========================================================================

    /// Assigns a fresh check-in code to a location, replacing any earlier one.
    #[instrument(skip_all, fields(location_id = %location_id))]
    pub async fn generate_qr_code(
        &self,
        principal: &Principal,
        merchant_id: &str,
        location_id: &str,
        qr_type: Option<QrType>,
    ) -> EngineResult<QrCodePayload> {
        principal.ensure_merchant_owner(merchant_id)?;
        let location = self.load_merchant_location(merchant_id, location_id).await?;

        let qr_type = qr_type.unwrap_or_default();
        let code = ids::new_id();
        self.db
            .merchants()
            .set_location_qr_code(&location.id, &code, qr_type, Utc::now())
            .await?;

        info!(location_id = %location.id, ?qr_type, "QR code generated");
        Ok(QrCodePayload {
            merchant_id: merchant_id.to_string(),
            location_id: location.id,
            qr_type,
            code,
        })
    }

    pub async fn get_qr_code(
        &self,
        principal: &Principal,
        merchant_id: &str,
        location_id: &str,
    ) -> EngineResult<QrCodePayload> {
        principal.ensure_merchant_owner(merchant_id)?;
        let location = self.load_merchant_location(merchant_id, location_id).await?;
        let code = location
            .qr_code
            .ok_or_else(|| EngineError::not_found("QR code", location_id))?;

        Ok(QrCodePayload {
            merchant_id: merchant_id.to_string(),
            location_id: location.id,
            qr_type: location.qr_type.unwrap_or_default(),
            code,
        })
    }

    /// Resolves a scanned code. Needs no principal.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown code
    /// - `Permission` if the location has been deactivated
    #[instrument(skip_all)]
    pub async fn validate_qr_code(&self, code: &str) -> EngineResult<QrValidation> {
        debug!("validate_qr_code");
        let location = self
            .db
            .merchants()
            .find_location_by_qr_code(code)
            .await?
            .ok_or_else(|| EngineError::not_found("QR code", code))?;
        if !location.active {
            warn!(location_id = %location.id, "Scanned QR code of an inactive location");
            return Err(EngineError::permission("This location is not active"));
        }
        let merchant = self.load_merchant(&location.merchant_id).await?;

        Ok(QrValidation {
            merchant_id: merchant.id,
            merchant_name: merchant.business_name,
            qr_type: location.qr_type.unwrap_or_default(),
            location: QrLocation {
                id: location.id,
                name: location.name,
                address: location.address,
            },
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engines_sharing_store, seeded_engine};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_merchant_defaults_and_duplicates() {
        let (engine, _) = seeded_engine().await;
        let request = RegisterMerchant {
            business_name: "Corner Books".to_string(),
            email: "Owner@CornerBooks.example".to_string(),
            ..RegisterMerchant::default()
        };

        let merchant = engine.register_merchant(request.clone()).await.unwrap();
        assert_eq!(merchant.email, "owner@cornerbooks.example");
        assert_eq!(merchant.return_period_days, 7);
        assert!(merchant.settings.allow_cash_refunds);

        let err = engine.register_merchant(request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("email")));

        let err = engine
            .register_merchant(RegisterMerchant {
                business_name: "Late Returns".to_string(),
                email: "late@returns.example".to_string(),
                return_period_days: Some(400),
                ..RegisterMerchant::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_customer_generates_code() {
        let (engine, _) = seeded_engine().await;
        let customer = engine
            .register_customer(RegisterCustomer {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace@navy.example".to_string(),
                ..RegisterCustomer::default()
            })
            .await
            .unwrap();
        assert!(customer.customer_code.starts_with('C'));
        assert_eq!(customer.customer_code.len(), 9);

        let err = engine
            .register_customer(RegisterCustomer {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace2@navy.example".to_string(),
                customer_code: Some(customer.customer_code.clone()),
                ..RegisterCustomer::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_locations_are_owner_only() {
        let (engine, seed) = seeded_engine().await;
        let location = engine
            .add_location(
                &seed.merchant(),
                NewLocation {
                    name: "Airport kiosk".to_string(),
                    ..NewLocation::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(engine.list_locations(&seed.merchant()).await.unwrap().len(), 2);

        let updated = engine
            .update_location(
                &seed.merchant(),
                &location.id,
                LocationUpdate {
                    name: Some("Terminal B kiosk".to_string()),
                    ..LocationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Terminal B kiosk");

        let err = engine
            .update_location(&Principal::merchant("other"), &location.id, LocationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = engine
            .add_location(&seed.customer(), NewLocation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Permission(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_location_edits_both_survive() {
        let (first, second, seed) = engines_sharing_store().await;
        let (first, second) = (Arc::new(first), Arc::new(second));

        for round in 0..10 {
            let rename = {
                let engine = first.clone();
                let principal = seed.merchant();
                let location_id = seed.location_id.clone();
                tokio::spawn(async move {
                    engine
                        .update_location(
                            &principal,
                            &location_id,
                            LocationUpdate {
                                name: Some(format!("Harbour Branch {}", round)),
                                ..LocationUpdate::default()
                            },
                        )
                        .await
                })
            };
            let toggle = {
                let engine = second.clone();
                let principal = seed.merchant();
                let location_id = seed.location_id.clone();
                tokio::spawn(async move {
                    engine
                        .update_location(
                            &principal,
                            &location_id,
                            LocationUpdate {
                                active: Some(round % 2 == 0),
                                ..LocationUpdate::default()
                            },
                        )
                        .await
                })
            };
            rename.await.unwrap().unwrap();
            toggle.await.unwrap().unwrap();

            let stored = first
                .database()
                .merchants()
                .get_location(&seed.location_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.name, format!("Harbour Branch {}", round));
            assert_eq!(stored.active, round % 2 == 0);
        }
    }

    #[tokio::test]
    async fn test_qr_code_lifecycle() {
        let (engine, seed) = seeded_engine().await;
        let err = engine
            .get_qr_code(&seed.merchant(), &seed.merchant_id, &seed.location_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let payload = engine
            .generate_qr_code(&seed.merchant(), &seed.merchant_id, &seed.location_id, Some(QrType::Return))
            .await
            .unwrap();
        assert_eq!(payload.qr_type, QrType::Return);
        let stored = engine
            .get_qr_code(&seed.merchant(), &seed.merchant_id, &seed.location_id)
            .await
            .unwrap();
        assert_eq!(stored, payload);

        let scanned = engine.validate_qr_code(&payload.code).await.unwrap();
        assert_eq!(scanned.merchant_id, seed.merchant_id);
        assert_eq!(scanned.location.id, seed.location_id);
        assert_eq!(scanned.qr_type, QrType::Return);

        let err = engine.validate_qr_code("unknown").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        engine
            .update_location(
                &seed.merchant(),
                &seed.location_id,
                LocationUpdate {
                    active: Some(false),
                    ..LocationUpdate::default()
                },
            )
            .await
            .unwrap();
        let err = engine.validate_qr_code(&payload.code).await.unwrap_err();
        assert!(matches!(err, EngineError::Permission(_)));

        let err = engine
            .generate_qr_code(&seed.customer(), &seed.merchant_id, &seed.location_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Permission(_)));
    }
}
