//! # Sale Repository
//!
//! Sales are stored across three tables and always read and written whole.
//!
//! ## Versioned Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  save(&mut sale)              sale.version == 4                         │
//! │     │                                                                   │
//! │     ├── BEGIN                                                          │
//! │     ├── UPDATE sales SET ..., version = version + 1                    │
//! │     │       WHERE id = ? AND version = 4                               │
//! │     │          │                                                        │
//! │     │          ├── 1 row  → continue                                   │
//! │     │          └── 0 rows → ROLLBACK, DbError::VersionConflict         │
//! │     ├── DELETE + INSERT sale_line_items                                │
//! │     ├── DELETE + INSERT payments   (UNIQUE transaction_id checked)     │
//! │     ├── COMMIT                                                         │
//! │     └── sale.version = 5                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `save_many` does the same for several sales inside one transaction, so a
//! refund never lands on the return without the original (or vice versa).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use receets_core::{
    LineItem, Payment, PaymentMethod, PaymentStatus, PromoCode, PromoType, Sale, SaleStatus,
    SaleType,
};

// =============================================================================
// Query Types
// =============================================================================

/// Filters for sale listings. Unset fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub merchant_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    pub location_id: Option<String>,
    pub sale_type: Option<SaleType>,
    pub status: Option<SaleStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Total,
    SaleNumber,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Total => "total_cents",
            SortField::SaleNumber => "sale_number",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One page of a listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: 1,
            limit: 10,
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl Page {
    fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit as i64
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    sale_number: String,
    merchant_id: String,
    location_id: String,
    customer_id: Option<String>,
    customer_code: Option<String>,
    sale_type: SaleType,
    status: SaleStatus,
    subtotal_cents: i64,
    tax_total_cents: i64,
    discount_total_cents: i64,
    total_cents: i64,
    promo_code: Option<String>,
    promo_discount: Option<i64>,
    promo_type: Option<PromoType>,
    original_sale_id: Option<String>,
    notes: Option<String>,
    receipt_url: Option<String>,
    cashier_id: Option<String>,
    cashier_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl SaleRow {
    fn into_sale(self, line_items: Vec<LineItem>, payments: Vec<Payment>) -> Sale {
        let promo_code = match (self.promo_code, self.promo_discount, self.promo_type) {
            (Some(code), Some(discount), Some(promo_type)) => Some(PromoCode {
                code,
                discount,
                promo_type,
            }),
            _ => None,
        };

        Sale {
            id: self.id,
            sale_number: self.sale_number,
            merchant_id: self.merchant_id,
            location_id: self.location_id,
            customer_id: self.customer_id,
            customer_code: self.customer_code,
            sale_type: self.sale_type,
            status: self.status,
            line_items,
            subtotal_cents: self.subtotal_cents,
            tax_total_cents: self.tax_total_cents,
            discount_total_cents: self.discount_total_cents,
            total_cents: self.total_cents,
            payments,
            promo_code,
            original_sale_id: self.original_sale_id,
            notes: self.notes,
            receipt_url: self.receipt_url,
            cashier_id: self.cashier_id,
            cashier_name: self.cashier_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            version: self.version,
        }
    }
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    product_id: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    discount_cents: i64,
    tax_cents: i64,
    total_cents: i64,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        LineItem {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            discount_cents: row.discount_cents,
            tax_cents: row.tax_cents,
            total_cents: row.total_cents,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    method: PaymentMethod,
    amount_cents: i64,
    status: PaymentStatus,
    transaction_id: Option<String>,
    card_brand: Option<String>,
    last4: Option<String>,
    tendered_cents: Option<i64>,
    change_cents: Option<i64>,
    refund_amount_cents: i64,
    refund_reason: Option<String>,
    refund_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            method: row.method,
            amount_cents: row.amount_cents,
            status: row.status,
            transaction_id: row.transaction_id,
            card_brand: row.card_brand,
            last4: row.last4,
            tendered_cents: row.tendered_cents,
            change_cents: row.change_cents,
            refund_amount_cents: row.refund_amount_cents,
            refund_reason: row.refund_reason,
            refund_date: row.refund_date,
            created_at: row.created_at,
        }
    }
}

const SALE_COLUMNS: &str = r#"
    id, sale_number, merchant_id, location_id, customer_id, customer_code,
    sale_type, status, subtotal_cents, tax_total_cents, discount_total_cents,
    total_cents, promo_code, promo_discount, promo_type, original_sale_id, notes,
    receipt_url, cashier_id, cashier_name, created_at, updated_at, completed_at, version
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its line items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = ?1",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(hydrate(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Inserts a new sale with its children.
    ///
    /// A taken sale number surfaces as `UniqueViolation("sales.sale_number")`.
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, merchant_id, location_id, customer_id, customer_code,
                sale_type, status, subtotal_cents, tax_total_cents, discount_total_cents,
                total_cents, promo_code, promo_discount, promo_type, original_sale_id, notes,
                receipt_url, cashier_id, cashier_name, created_at, updated_at, completed_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.merchant_id)
        .bind(&sale.location_id)
        .bind(&sale.customer_id)
        .bind(&sale.customer_code)
        .bind(sale.sale_type)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_total_cents)
        .bind(sale.discount_total_cents)
        .bind(sale.total_cents)
        .bind(sale.promo_code.as_ref().map(|p| p.code.clone()))
        .bind(sale.promo_code.as_ref().map(|p| p.discount))
        .bind(sale.promo_code.as_ref().map(|p| p.promo_type))
        .bind(&sale.original_sale_id)
        .bind(&sale.notes)
        .bind(&sale.receipt_url)
        .bind(&sale.cashier_id)
        .bind(&sale.cashier_name)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.completed_at)
        .bind(sale.version)
        .execute(&mut *tx)
        .await?;

        insert_children(&mut *tx, sale).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Writes back a sale read earlier, failing if anyone saved it in between.
    ///
    /// On success `sale.version` is advanced to the stored version.
    pub async fn save(&self, sale: &mut Sale) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        write_sale(&mut *tx, sale).await?;
        tx.commit().await?;

        sale.version += 1;
        Ok(())
    }

    /// Saves several sales atomically: all are written or none.
    pub async fn save_many(&self, sales: &mut [&mut Sale]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for sale in sales.iter() {
            write_sale(&mut *tx, sale).await?;
        }
        tx.commit().await?;

        for sale in sales.iter_mut() {
            sale.version += 1;
        }
        Ok(())
    }

    /// Lists sales matching `filter`, returning one page and the total match count.
    pub async fn list(&self, filter: &SaleFilter, page: &Page) -> DbResult<(Vec<Sale>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM sales WHERE 1 = 1", SALE_COLUMNS));
        push_filters(&mut select, filter);
        select.push(format!(
            " ORDER BY {col} {dir}, id {dir}",
            col = page.sort.column(),
            dir = page.order.keyword()
        ));
        select.push(" LIMIT ");
        select.push_bind(page.limit as i64);
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let rows: Vec<SaleRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let sales = self.hydrate_all(rows).await?;

        debug!(total, returned = sales.len(), "Listed sales");
        Ok((sales, total))
    }

    /// Completed purchases of one customer at a merchant created at or after `since`.
    ///
    /// Matches on `customer_id` when given, otherwise on `customer_code`.
    pub async fn eligible_for_return(
        &self,
        merchant_id: &str,
        customer_id: Option<&str>,
        customer_code: Option<&str>,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        let filter = SaleFilter {
            merchant_id: Some(merchant_id.to_string()),
            customer_id: customer_id.map(str::to_string),
            customer_code: if customer_id.is_some() {
                None
            } else {
                customer_code.map(str::to_string)
            },
            sale_type: Some(SaleType::Purchase),
            status: Some(SaleStatus::Completed),
            created_from: Some(since),
            ..SaleFilter::default()
        };

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM sales WHERE 1 = 1", SALE_COLUMNS));
        push_filters(&mut select, &filter);
        select.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<SaleRow> = select.build_query_as().fetch_all(&self.pool).await?;
        self.hydrate_all(rows).await
    }

    async fn hydrate_all(&self, rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(hydrate(&mut conn, row).await?);
        }
        Ok(sales)
    }
}

// =============================================================================
// Connection-level Helpers
// =============================================================================

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SaleFilter) {
    if let Some(v) = &filter.merchant_id {
        qb.push(" AND merchant_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.customer_code {
        qb.push(" AND customer_code = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.location_id {
        qb.push(" AND location_id = ").push_bind(v.clone());
    }
    if let Some(v) = filter.sale_type {
        qb.push(" AND sale_type = ").push_bind(v);
    }
    if let Some(v) = filter.status {
        qb.push(" AND status = ").push_bind(v);
    }
    if let Some(v) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(v);
    }
    if let Some(v) = filter.created_to {
        qb.push(" AND created_at <= ").push_bind(v);
    }
}

async fn hydrate(conn: &mut SqliteConnection, row: SaleRow) -> DbResult<Sale> {
    let line_items = sqlx::query_as::<_, LineItemRow>(
        r#"
        SELECT product_id, product_name, quantity, unit_price_cents,
               discount_cents, tax_cents, total_cents
        FROM sale_line_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(LineItem::from)
    .collect();

    let payments = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT id, method, amount_cents, status, transaction_id, card_brand, last4,
               tendered_cents, change_cents, refund_amount_cents, refund_reason,
               refund_date, created_at
        FROM payments
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Payment::from)
    .collect();

    Ok(row.into_sale(line_items, payments))
}

/// Version-checked update of the sale row plus a full rewrite of its children.
async fn write_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, version = sale.version, status = %sale.status, "Saving sale");

    let result = sqlx::query(
        r#"
        UPDATE sales SET
            customer_id = ?3, customer_code = ?4, status = ?5,
            subtotal_cents = ?6, tax_total_cents = ?7, discount_total_cents = ?8,
            total_cents = ?9, promo_code = ?10, promo_discount = ?11, promo_type = ?12,
            notes = ?13, receipt_url = ?14, updated_at = ?15, completed_at = ?16,
            version = version + 1
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&sale.id)
    .bind(sale.version)
    .bind(&sale.customer_id)
    .bind(&sale.customer_code)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_total_cents)
    .bind(sale.discount_total_cents)
    .bind(sale.total_cents)
    .bind(sale.promo_code.as_ref().map(|p| p.code.clone()))
    .bind(sale.promo_code.as_ref().map(|p| p.discount))
    .bind(sale.promo_code.as_ref().map(|p| p.promo_type))
    .bind(&sale.notes)
    .bind(&sale.receipt_url)
    .bind(sale.updated_at)
    .bind(sale.completed_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM sales WHERE id = ?1")
            .bind(&sale.id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => DbError::version_conflict("Sale", &sale.id),
            None => DbError::not_found("Sale", &sale.id),
        });
    }

    sqlx::query("DELETE FROM sale_line_items WHERE sale_id = ?1")
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM payments WHERE sale_id = ?1")
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;

    insert_children(conn, sale).await
}

async fn insert_children(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    for (position, item) in sale.line_items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_line_items (
                sale_id, position, product_id, product_name, quantity,
                unit_price_cents, discount_cents, tax_cents, total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.tax_cents)
        .bind(item.total_cents)
        .execute(&mut *conn)
        .await?;
    }

    for (position, payment) in sale.payments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, position, method, amount_cents, status, transaction_id,
                card_brand, last4, tendered_cents, change_cents, refund_amount_cents,
                refund_reason, refund_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&payment.id)
        .bind(&sale.id)
        .bind(position as i64)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.status)
        .bind(&payment.transaction_id)
        .bind(&payment.card_brand)
        .bind(&payment.last4)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(payment.refund_amount_cents)
        .bind(&payment.refund_reason)
        .bind(payment.refund_date)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::{Database, DbConfig};
    use chrono::Duration;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.merchants().insert(&fixtures::merchant("m-1")).await.unwrap();
        db.merchants().insert_location(&fixtures::location("l-1", "m-1")).await.unwrap();
        db.customers().insert(&fixtures::customer("c-1")).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_insert_and_load_round_trip() {
        let db = seeded().await;
        let mut sale = fixtures::sale("s-1", "m-1", "l-1");
        sale.promo_code = Some(PromoCode {
            code: "TEN".to_string(),
            discount: 10,
            promo_type: PromoType::Percentage,
        });
        sale.recompute_totals().unwrap();
        db.sales().insert(&sale).await.unwrap();

        let loaded = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.line_items, sale.line_items);
        assert_eq!(loaded.promo_code, sale.promo_code);
        assert_eq!(loaded.total_cents, sale.total_cents);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_rewrites_payments() {
        let db = seeded().await;
        let mut sale = fixtures::sale("s-1", "m-1", "l-1");
        db.sales().insert(&sale).await.unwrap();

        sale.apply_payment(fixtures::cash_payment("p-1", "CASH-1", 2100), Utc::now())
            .unwrap();
        db.sales().save(&mut sale).await.unwrap();
        assert_eq!(sale.version, 1);

        let loaded = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.status, SaleStatus::Completed);
        assert_eq!(loaded.payments.len(), 1);
        assert_eq!(loaded.payments[0].tendered_cents, Some(2100));
    }

    #[tokio::test]
    async fn test_stale_save_is_version_conflict() {
        let db = seeded().await;
        let sale = fixtures::sale("s-1", "m-1", "l-1");
        db.sales().insert(&sale).await.unwrap();

        let mut first = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        let mut second = first.clone();

        first.apply_payment(fixtures::cash_payment("p-1", "CASH-1", 1000), Utc::now())
            .unwrap();
        db.sales().save(&mut first).await.unwrap();

        second
            .apply_payment(fixtures::cash_payment("p-2", "CASH-2", 1000), Utc::now())
            .unwrap();
        let err = db.sales().save(&mut second).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        let stored = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.payments[0].id, "p-1");
    }

    #[tokio::test]
    async fn test_duplicate_transaction_id_rejected() {
        let db = seeded().await;
        let mut a = fixtures::sale("s-1", "m-1", "l-1");
        let mut b = fixtures::sale("s-2", "m-1", "l-1");
        b.sale_number = "SALE-2-002".to_string();
        db.sales().insert(&a).await.unwrap();
        db.sales().insert(&b).await.unwrap();

        a.apply_payment(fixtures::cash_payment("p-1", "TXN-1", 500), Utc::now()).unwrap();
        db.sales().save(&mut a).await.unwrap();

        b.apply_payment(fixtures::cash_payment("p-2", "TXN-1", 500), Utc::now()).unwrap();
        let err = db.sales().save(&mut b).await.unwrap_err();
        assert!(err.is_unique_violation_on("payments.transaction_id"));

        let first = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(first.payments[0].transaction_id.as_deref(), Some("TXN-1"));
        let second = db.sales().get_by_id("s-2").await.unwrap().unwrap();
        assert!(second.payments.is_empty());
    }

    #[tokio::test]
    async fn test_save_many_is_atomic() {
        let db = seeded().await;
        let mut a = fixtures::sale("s-1", "m-1", "l-1");
        let mut b = fixtures::sale("s-2", "m-1", "l-1");
        b.sale_number = "SALE-2-002".to_string();
        db.sales().insert(&a).await.unwrap();
        db.sales().insert(&b).await.unwrap();

        // b is stale, so neither write may land
        let mut b_fresh = b.clone();
        b_fresh.notes = Some("touched".to_string());
        db.sales().save(&mut b_fresh).await.unwrap();

        a.notes = Some("first".to_string());
        b.notes = Some("second".to_string());
        let err = db.sales().save_many(&mut [&mut a, &mut b]).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));
        assert_eq!(a.version, 0);

        let stored_a = db.sales().get_by_id("s-1").await.unwrap().unwrap();
        assert!(stored_a.notes.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let db = seeded().await;
        let now = Utc::now();
        for i in 0..5 {
            let mut sale = fixtures::sale(&format!("s-{}", i), "m-1", "l-1");
            sale.sale_number = format!("SALE-{}-00{}", i, i);
            sale.created_at = now - Duration::minutes(i);
            if i % 2 == 0 {
                sale.customer_id = Some("c-1".to_string());
            }
            db.sales().insert(&sale).await.unwrap();
        }

        let filter = SaleFilter {
            merchant_id: Some("m-1".to_string()),
            ..SaleFilter::default()
        };
        let page = Page {
            page: 2,
            limit: 2,
            ..Page::default()
        };
        let (sales, total) = db.sales().list(&filter, &page).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(sales.len(), 2);
        // newest first: s-0, s-1 | s-2, s-3 | s-4
        assert_eq!(sales[0].id, "s-2");

        let filter = SaleFilter {
            customer_id: Some("c-1".to_string()),
            ..SaleFilter::default()
        };
        let (sales, total) = db.sales().list(&filter, &Page::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(sales.len(), 3);
    }

    #[tokio::test]
    async fn test_eligible_for_return_window() {
        let db = seeded().await;
        let now = Utc::now();

        let mut recent = fixtures::sale("s-recent", "m-1", "l-1");
        recent.customer_code = Some("CABC12345".to_string());
        recent.status = SaleStatus::Completed;
        recent.created_at = now - Duration::days(2);

        let mut old = fixtures::sale("s-old", "m-1", "l-1");
        old.sale_number = "SALE-OLD".to_string();
        old.customer_code = Some("CABC12345".to_string());
        old.status = SaleStatus::Completed;
        old.created_at = now - Duration::days(10);

        let mut draft = fixtures::sale("s-draft", "m-1", "l-1");
        draft.sale_number = "SALE-DRAFT".to_string();
        draft.customer_code = Some("CABC12345".to_string());

        for sale in [&recent, &old, &draft] {
            db.sales().insert(sale).await.unwrap();
        }

        let eligible = db
            .sales()
            .eligible_for_return("m-1", None, Some("CABC12345"), now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, "s-recent");
    }
}
