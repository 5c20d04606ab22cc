//! # Database Migrations
//!
//! SQL files under `migrations/sqlite/` at the workspace root are embedded
//! at compile time and applied in filename order on startup.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   operators, products, register_sessions,
//!                              sales, sale_lines, pending_sales
//! ```
//!
//! Never edit an applied migration; add `NNN_description.sql` instead.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// `(embedded, applied)` migration counts, for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
