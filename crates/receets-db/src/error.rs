//! # Storage Errors
//!
//! Two variants carry meaning above this crate:
//!
//! | variant                                      | engine reads it as        |
//! |----------------------------------------------|---------------------------|
//! | `UniqueViolation` on `payments.transaction_id` | `DuplicatePayment`      |
//! | `VersionConflict` on a sale or location save | reload and retry, then `Conflict` |
//!
//! Everything else ends up as a generic database failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is `table.column` exactly as SQLite names it, e.g.
    /// `payments.transaction_id` or `customers.customer_code`. SQLite does
    /// not report the offending value, so `value` is filled in by callers
    /// that know it.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// An optimistic save found a different `version` than it loaded.
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: String, id: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored enum tag or JSON column no longer parses.
    #[error("Corrupt {entity} row: {message}")]
    Corrupt { entity: String, message: String },

    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";
const FOREIGN_KEY_MARKER: &str = "FOREIGN KEY constraint failed";

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn version_conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::VersionConflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }

    /// Sorts a SQLite driver message into a constraint kind.
    fn from_sqlite_message(message: &str) -> Self {
        if let Some(field) = message.strip_prefix(UNIQUE_PREFIX) {
            // Composite keys come through as "t.a, t.b"; the first column names it.
            let field = field.split(',').next().unwrap_or(field).trim();
            return DbError::UniqueViolation {
                field: field.to_string(),
                value: "unknown".to_string(),
            };
        }
        if message.contains(FOREIGN_KEY_MARKER) {
            return DbError::ForeignKeyViolation {
                message: message.to_string(),
            };
        }
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("store is closed".to_string()),
            sqlx::Error::ColumnDecode { index, source } => DbError::Corrupt {
                entity: "column".to_string(),
                message: format!("{}: {}", index, source),
            },
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
