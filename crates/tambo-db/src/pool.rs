//! # Connection Pool
//!
//! Opens the register's local SQLite file and hands out repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("…/tambo.db")         DbConfig::in_memory()              │
//! │          │                                   │                          │
//! │          └──────────────┬────────────────────┘                          │
//! │                         ▼                                               │
//! │            Database::new(config).await                                  │
//! │              ├─ WAL journal, synchronous = NORMAL                       │
//! │              ├─ foreign keys on (sales → register_sessions)             │
//! │              ├─ busy_timeout: two terminals committing at once wait     │
//! │              └─ embedded migrations                                     │
//! │                         │                                               │
//! │        ┌────────┬───────┼────────┬──────────────┐                       │
//! │        ▼        ▼       ▼        ▼              ▼                       │
//! │    products operators sessions  sales     pending_sales                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catalog and session reads share the pool; a sale commit keeps a single
//! connection for its transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::operator::OperatorRepository;
use crate::repository::pending::PendingSaleRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::session::SessionRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings for one register database.
///
/// ```rust,ignore
/// let config = DbConfig::new(data_dir.join("tambo.db")).busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first use. `:memory:` for a throwaway database.
    pub database_path: PathBuf,

    /// A register rarely needs more than a handful.
    pub max_connections: u32,

    pub min_connections: u32,

    /// How long to wait for a free connection from the pool.
    pub acquire_timeout: Duration,

    /// How long SQLite waits on a locked database before `SQLITE_BUSY`.
    pub busy_timeout: Duration,

    pub idle_timeout: Duration,

    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// A private database that disappears with the pool. Used by tests.
    ///
    /// Limited to one connection: every SQLite connection to `:memory:`
    /// would otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY_PATH)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let base = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else {
            SqliteConnectOptions::from_str(&format!(
                "sqlite://{}",
                self.database_path.display()
            ))
        }
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let options = base
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(true);

        // WAL needs a file; an in-memory database keeps its default journal.
        Ok(if self.is_in_memory() {
            options
        } else {
            options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        })
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the register database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects, then applies pending migrations unless disabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening register database");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(
            max = config.max_connections,
            busy_timeout = ?config.busy_timeout,
            "Pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        } else {
            warn!("Migrations disabled; schema assumed current");
        }
        Ok(db)
    }

    /// Applies embedded migrations not yet recorded in `_sqlx_migrations`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Schema up to date");
        Ok(())
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn operators(&self) -> OperatorRepository {
        OperatorRepository::new(self.pool.clone())
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// The local journal of sales made while the store was unreachable.
    pub fn pending_sales(&self) -> PendingSaleRepository {
        PendingSaleRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later calls fail as unavailable.
    pub async fn close(&self) {
        info!("Closing register database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_migrations_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_closed_pool_reports_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
        let err = db.products().list_active(10).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_file_database_in_wal_mode() {
        let dir = std::env::temp_dir().join(format!("tambo-db-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::new(DbConfig::new(dir.join("tambo.db"))).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        db.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/tambo-test.db")
            .max_connections(8)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
