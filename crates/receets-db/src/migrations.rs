//! Schema migrations, embedded from `migrations/sqlite/` at build time.
//!
//! Files are applied in name order (`001_initial_schema.sql`, ...) and
//! recorded in `_sqlx_migrations`. An applied file is never edited; schema
//! changes go in a new, higher-numbered file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (embedded, applied_before) = migration_status(pool).await?;
    debug!(embedded, applied_before, "Applying schema migrations");

    MIGRATOR.run(pool).await?;

    let (_, applied) = migration_status(pool).await?;
    if applied > applied_before {
        info!(newly_applied = applied - applied_before, "Schema migrated");
    }
    Ok(())
}

/// `(embedded, applied)` counts. A store that has never been migrated has
/// no bookkeeping table and reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((MIGRATOR.migrations.len(), applied.max(0) as usize))
}
