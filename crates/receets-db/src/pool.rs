//! # Database Handle
//!
//! Opens the SQLite store behind every Receets operation and hands out
//! repositories that share one pool.
//!
//! ## Opening
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DbConfig::new("receets.db")          DbConfig::in_memory()             │
//! │       │  WAL, synchronous=NORMAL           │  one connection, no idle   │
//! │       │  busy_timeout, foreign keys        │  timeout, foreign keys     │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │            Database::new(config)                                        │
//! │                      │  migrations (unless disabled)                    │
//! │                      ▼                                                  │
//! │   db.sales()      db.merchants()      db.customers()                    │
//! │   (versioned)     (+ locations, QR)   (+ gateway id CAS)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two payments landing on the same file serialize on SQLite's write lock;
//! `busy_timeout` makes the second writer wait instead of failing.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::merchant::MerchantRepository;
use crate::repository::sale::SaleRepository;

/// Connections are recycled after this long on file-backed stores.
const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how many connections may touch it.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/receets/receets.db").max_connections(10);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `None` for a private in-memory store.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    /// How long a request waits for a pooled connection.
    pub acquire_timeout: Duration,
    /// How long a writer waits on SQLite's lock before reporting busy.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file-backed store, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private store that disappears with the handle.
    ///
    /// Each SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.path {
            None => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        };
        Ok(options
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the store. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and applies pending migrations.
    ///
    /// ## Errors
    /// - `ConnectionFailed` if the file cannot be opened or created
    /// - `MigrationFailed` if an embedded migration fails
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let location = config
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout);
        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.max_lifetime(CONNECTION_MAX_LIFETIME)
        };

        let pool = pool_options
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", location, e)))?;

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        } else {
            warn!(%location, "Migrations disabled; schema is assumed current");
        }

        info!(
            %location,
            max_connections = config.max_connections,
            "Database ready"
        );
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn merchants(&self) -> MerchantRepository {
        MerchantRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// True while the store answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Waits for in-flight queries, then closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (embedded, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(embedded, applied);
    }

    #[test]
    fn test_file_config() {
        let config = DbConfig::new("/tmp/receets-test.db")
            .max_connections(4)
            .run_migrations(false);

        assert_eq!(config.max_connections, 4);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_closed_store_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
