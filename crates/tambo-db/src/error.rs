//! # Database Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← categorized                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (tambo-ledger) ← Unavailable / Conflict / Duplicate        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError ← what the register screen shows                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tambo_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (e.g. a sale id stored twice).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - A sale for a session that was never stored
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A version-guarded write found a different version than expected.
    ///
    /// Somebody else updated the row in between; re-read and retry.
    #[error("{entity} {id} changed concurrently (expected version {expected})")]
    Conflict {
        entity: String,
        id: String,
        expected: i64,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Another connection held the write lock past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Input rejected before it reached SQL.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    /// A stored value could not be turned back into a domain type.
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: String, reason: String },

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>, expected: i64) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
            expected,
        }
    }

    pub fn corrupt(entity: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Corrupt {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the database itself could not be reached, as opposed to a
    /// query being refused.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionFailed(_) | DbError::PoolExhausted | DbError::Busy(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint type, or Busy when locked
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::corrupt("payload", err)
    }
}

pub type DbResult<T> = Result<T, DbError>;
