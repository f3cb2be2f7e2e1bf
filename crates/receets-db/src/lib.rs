//! # receets-db
//!
//! SQLite persistence for merchants, their locations, customers and sales.
//!
//! ```text
//! PosEngine ──► Database ──┬── SaleRepository      sales + line items + payments,
//!                          │                         saved under a version check
//!                          ├── MerchantRepository  merchants, locations, QR codes
//!                          └── CustomerRepository  customers, gateway customer ids
//!                                 │
//!                                 ▼
//!                          SqlitePool (sqlx) ──► migrations/sqlite/*.sql
//! ```
//!
//! ```rust,ignore
//! use receets_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("receets.db")).await?;
//! let mut sale = db.sales().get_by_id(&id).await?.ok_or(...)?;
//! sale.void(Some("duplicate"), Utc::now())?;
//! db.sales().save(&mut sale).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::customer::CustomerRepository;
pub use repository::merchant::MerchantRepository;
pub use repository::sale::{Page, SaleFilter, SaleRepository, SortField, SortOrder};
