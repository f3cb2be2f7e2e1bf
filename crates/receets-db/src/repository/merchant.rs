//! # Merchant Repository
//!
//! Merchants, their locations and the QR check-in code stored on each location.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use receets_core::{
    Address, BusinessType, Location, Merchant, MerchantRole, MerchantSettings, QrType,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct MerchantRow {
    id: String,
    business_name: String,
    email: String,
    phone: Option<String>,
    business_type: BusinessType,
    tax_id: Option<String>,
    return_period_days: i64,
    allow_partial_returns: bool,
    require_receipt_for_returns: bool,
    allow_cash_refunds: bool,
    notify_customer_on_sale: bool,
    gateway_account_id: Option<String>,
    active: bool,
    role: MerchantRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MerchantRow> for Merchant {
    fn from(row: MerchantRow) -> Self {
        Merchant {
            id: row.id,
            business_name: row.business_name,
            email: row.email,
            phone: row.phone,
            business_type: row.business_type,
            tax_id: row.tax_id,
            return_period_days: row.return_period_days,
            settings: MerchantSettings {
                allow_partial_returns: row.allow_partial_returns,
                require_receipt_for_returns: row.require_receipt_for_returns,
                allow_cash_refunds: row.allow_cash_refunds,
                notify_customer_on_sale: row.notify_customer_on_sale,
            },
            gateway_account_id: row.gateway_account_id,
            active: row.active,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: String,
    merchant_id: String,
    name: String,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
    qr_code: Option<String>,
    qr_type: Option<QrType>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            merchant_id: row.merchant_id,
            name: row.name,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                zip_code: row.zip_code,
                country: row.country,
            },
            qr_code: row.qr_code,
            qr_type: row.qr_type,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        }
    }
}

const MERCHANT_COLUMNS: &str = r#"
    id, business_name, email, phone, business_type, tax_id, return_period_days,
    allow_partial_returns, require_receipt_for_returns, allow_cash_refunds,
    notify_customer_on_sale, gateway_account_id, active, role, created_at, updated_at
"#;

const LOCATION_COLUMNS: &str = r#"
    id, merchant_id, name, street, city, state, zip_code, country,
    qr_code, qr_type, active, created_at, updated_at, version
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for merchant and location operations.
#[derive(Debug, Clone)]
pub struct MerchantRepository {
    pool: SqlitePool,
}

impl MerchantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MerchantRepository { pool }
    }

    /// Inserts a merchant. A taken email surfaces as `UniqueViolation("merchants.email")`.
    pub async fn insert(&self, merchant: &Merchant) -> DbResult<()> {
        debug!(id = %merchant.id, email = %merchant.email, "Inserting merchant");

        sqlx::query(
            r#"
            INSERT INTO merchants (
                id, business_name, email, phone, business_type, tax_id, return_period_days,
                allow_partial_returns, require_receipt_for_returns, allow_cash_refunds,
                notify_customer_on_sale, gateway_account_id, active, role, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&merchant.id)
        .bind(&merchant.business_name)
        .bind(&merchant.email)
        .bind(&merchant.phone)
        .bind(merchant.business_type)
        .bind(&merchant.tax_id)
        .bind(merchant.return_period_days)
        .bind(merchant.settings.allow_partial_returns)
        .bind(merchant.settings.require_receipt_for_returns)
        .bind(merchant.settings.allow_cash_refunds)
        .bind(merchant.settings.notify_customer_on_sale)
        .bind(&merchant.gateway_account_id)
        .bind(merchant.active)
        .bind(merchant.role)
        .bind(merchant.created_at)
        .bind(merchant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>(&format!(
            "SELECT {} FROM merchants WHERE id = ?1",
            MERCHANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Merchant::from))
    }

    // =========================================================================
    // Locations
    // =========================================================================

    pub async fn insert_location(&self, location: &Location) -> DbResult<()> {
        debug!(id = %location.id, merchant_id = %location.merchant_id, "Inserting location");

        sqlx::query(
            r#"
            INSERT INTO merchant_locations (
                id, merchant_id, name, street, city, state, zip_code, country,
                qr_code, qr_type, active, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&location.id)
        .bind(&location.merchant_id)
        .bind(&location.name)
        .bind(&location.address.street)
        .bind(&location.address.city)
        .bind(&location.address.state)
        .bind(&location.address.zip_code)
        .bind(&location.address.country)
        .bind(&location.qr_code)
        .bind(location.qr_type)
        .bind(location.active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .bind(location.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_location(&self, id: &str) -> DbResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {} FROM merchant_locations WHERE id = ?1",
            LOCATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Location::from))
    }

    pub async fn list_locations(&self, merchant_id: &str) -> DbResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {} FROM merchant_locations WHERE merchant_id = ?1 ORDER BY created_at, id",
            LOCATION_COLUMNS
        ))
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Location::from).collect())
    }

    /// Saves the editable fields of a location (name, address, active) if
    /// nobody else has saved it since it was read, then bumps `version`.
    ///
    /// ## Errors
    /// - `VersionConflict` if the stored version moved on
    /// - `NotFound` if the location is gone
    pub async fn update_location(&self, location: &mut Location) -> DbResult<()> {
        debug!(id = %location.id, version = location.version, "Saving location");

        let result = sqlx::query(
            r#"
            UPDATE merchant_locations
            SET name = ?2, street = ?3, city = ?4, state = ?5, zip_code = ?6,
                country = ?7, active = ?8, updated_at = ?9, version = version + 1
            WHERE id = ?1 AND version = ?10
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(&location.address.street)
        .bind(&location.address.city)
        .bind(&location.address.state)
        .bind(&location.address.zip_code)
        .bind(&location.address.country)
        .bind(location.active)
        .bind(location.updated_at)
        .bind(location.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.get_location(&location.id).await? {
                Some(_) => DbError::version_conflict("Location", &location.id),
                None => DbError::not_found("Location", &location.id),
            });
        }
        location.version += 1;
        Ok(())
    }

    /// Replaces the location's QR check-in code.
    pub async fn set_location_qr_code(
        &self,
        location_id: &str,
        code: &str,
        qr_type: QrType,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE merchant_locations
             SET qr_code = ?2, qr_type = ?3, updated_at = ?4, version = version + 1
             WHERE id = ?1",
        )
        .bind(location_id)
        .bind(code)
        .bind(qr_type)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", location_id));
        }
        Ok(())
    }

    pub async fn find_location_by_qr_code(&self, code: &str) -> DbResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {} FROM merchant_locations WHERE qr_code = ?1",
            LOCATION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Location::from))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_merchant_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut merchant = fixtures::merchant("m-1");
        merchant.settings.allow_cash_refunds = false;
        db.merchants().insert(&merchant).await.unwrap();

        let loaded = db.merchants().get_by_id("m-1").await.unwrap().unwrap();
        assert_eq!(loaded.business_name, merchant.business_name);
        assert!(!loaded.settings.allow_cash_refunds);
        assert!(loaded.settings.allow_partial_returns);
        assert!(db.merchants().get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();

        let mut other = fixtures::merchant("m-2");
        other.email = fixtures::merchant("m-1").email;
        let err = db.merchants().insert(&other).await.unwrap_err();
        assert!(err.is_unique_violation_on("merchants.email"));
    }

    #[tokio::test]
    async fn test_location_qr_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();
        db.merchants().insert_location(&fixtures::location("l-1", "m-1")).await.unwrap();

        db.merchants()
            .set_location_qr_code("l-1", "code-123", QrType::Return, Utc::now())
            .await
            .unwrap();

        let found = db.merchants().find_location_by_qr_code("code-123").await.unwrap().unwrap();
        assert_eq!(found.id, "l-1");
        assert_eq!(found.qr_type, Some(QrType::Return));

        let missing = db
            .merchants()
            .set_location_qr_code("l-404", "x", QrType::Purchase, Utc::now())
            .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_location() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();
        let mut location = fixtures::location("l-1", "m-1");
        db.merchants().insert_location(&location).await.unwrap();

        location.name = "Harbour Branch".to_string();
        location.address.city = Some("Lisbon".to_string());
        location.active = false;
        db.merchants().update_location(&mut location).await.unwrap();
        assert_eq!(location.version, 1);

        let loaded = db.merchants().get_location("l-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Harbour Branch");
        assert_eq!(loaded.address.city.as_deref(), Some("Lisbon"));
        assert!(!loaded.active);
        assert_eq!(loaded.version, 1);
        assert_eq!(db.merchants().list_locations("m-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_location_save_is_a_version_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();
        db.merchants()
            .insert_location(&fixtures::location("l-1", "m-1"))
            .await
            .unwrap();

        let mut first = db.merchants().get_location("l-1").await.unwrap().unwrap();
        let mut second = first.clone();

        first.name = "Harbour Branch".to_string();
        db.merchants().update_location(&mut first).await.unwrap();

        second.active = false;
        let err = db.merchants().update_location(&mut second).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { ref entity, .. } if entity == "Location"));
        assert_eq!(second.version, 0);

        let stored = db.merchants().get_location("l-1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Harbour Branch");
        assert!(stored.active);

        let mut gone = fixtures::location("l-404", "m-1");
        let err = db.merchants().update_location(&mut gone).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_qr_assignment_bumps_location_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();
        let mut stale = fixtures::location("l-1", "m-1");
        db.merchants().insert_location(&stale).await.unwrap();

        db.merchants()
            .set_location_qr_code("l-1", "code-1", QrType::Purchase, Utc::now())
            .await
            .unwrap();
        stale.name = "Renamed".to_string();
        let err = db.merchants().update_location(&mut stale).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));
    }
}
