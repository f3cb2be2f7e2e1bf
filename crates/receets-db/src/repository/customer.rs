//! # Customer Repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use receets_core::Customer;

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    customer_code: String,
    gateway_customer_id: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            customer_code: row.customer_code,
            gateway_customer_id: row.gateway_customer_id,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CUSTOMER_COLUMNS: &str = r#"
    id, first_name, last_name, email, phone, customer_code,
    gateway_customer_id, active, created_at, updated_at
"#;

/// Repository for customer operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, code = %customer.customer_code, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, first_name, last_name, email, phone, customer_code,
                gateway_customer_id, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.customer_code)
        .bind(&customer.gateway_customer_id)
        .bind(customer.active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = ?1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    pub async fn get_by_code(&self, customer_code: &str) -> DbResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE customer_code = ?1",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    /// Caches the gateway profile id unless one is already stored.
    ///
    /// Returns `false` when another request stored an id first; the caller
    /// should re-read the customer and use the stored one.
    pub async fn set_gateway_customer_id_if_absent(
        &self,
        customer_id: &str,
        gateway_customer_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET gateway_customer_id = ?2, updated_at = ?3
            WHERE id = ?1 AND gateway_customer_id IS NULL
            "#,
        )
        .bind(customer_id)
        .bind(gateway_customer_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_lookup_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = fixtures::customer("c-1");
        db.customers().insert(&customer).await.unwrap();

        let found = db.customers().get_by_code(&customer.customer_code).await.unwrap().unwrap();
        assert_eq!(found.id, "c-1");
        assert!(db.customers().get_by_code("CNOPE0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gateway_id_is_set_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().insert(&fixtures::customer("c-1")).await.unwrap();

        let repo = db.customers();
        assert!(repo.set_gateway_customer_id_if_absent("c-1", "cus_A", Utc::now()).await.unwrap());
        assert!(!repo.set_gateway_customer_id_if_absent("c-1", "cus_B", Utc::now()).await.unwrap());

        let stored = repo.get_by_id("c-1").await.unwrap().unwrap();
        assert_eq!(stored.gateway_customer_id.as_deref(), Some("cus_A"));
    }
}
