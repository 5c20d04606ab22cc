//! # Ledger Error Types
//!
//! Two layers: [`StoreError`] is what a [`crate::store::LedgerStore`] may
//! answer, [`LedgerError`] is what callers of the service see.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Caller input   │  │ Register state  │  │     Persistence         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  RegisterClosed │  │  Unavailable ─► queue   │ │
//! │  │  RateLimited    │  │  SessionNotFound│  │  Conflict    ─► re-read │ │
//! │  │  Core (limits)  │  │  Consistency    │  │  Rejected / Duplicate   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Validation and register-state errors are decided before any write.    │
//! │  Persistence errors are never swallowed.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use thiserror::Error;

use tambo_core::{BusinessDayKey, CoreError, ValidationError};
use tambo_db::DbError;

/// Result type alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Store Error
// =============================================================================

/// Failure answered by the persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached. Sales take the offline path.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write.
    #[error("Store rejected the write: {0}")]
    Rejected(String),

    /// The session moved on since it was read.
    #[error("Session {key} changed concurrently (expected version {expected})")]
    Conflict { key: String, expected: i64 },

    /// A record with this id already exists.
    #[error("{entity} {id} already exists")]
    Duplicate { entity: String, id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable(reason.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            return StoreError::Unavailable(err.to_string());
        }
        match err {
            DbError::Conflict { id, expected, .. } => StoreError::Conflict { key: id, expected },
            DbError::UniqueViolation { field, value } => StoreError::Duplicate {
                entity: field,
                id: value,
            },
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors surfaced by [`crate::RegisterService`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed cart or input. Never reaches the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The register is not open for this operator and day.
    ///
    /// The register is never opened on the caller's behalf.
    #[error("Register for {operator_id} on {business_day} is not open; open the register first")]
    RegisterClosed {
        operator_id: String,
        business_day: BusinessDayKey,
    },

    #[error("No register session for {operator_id} on {business_day}")]
    SessionNotFound {
        operator_id: String,
        business_day: BusinessDayKey,
    },

    /// Sales for the register are still waiting in the offline queue.
    ///
    /// A register is not closed over money it has not recorded yet.
    #[error("{pending} queued sale(s) for {operator_id} on {business_day} are not recorded yet; retry once the store is reachable")]
    PendingSales {
        operator_id: String,
        business_day: BusinessDayKey,
        pending: usize,
    },

    /// A successor state would break the ledger identities.
    #[error("Ledger consistency violation: {0}")]
    Consistency(String),

    /// The store failed and the operation did not happen.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Too many sales in a short window (double clicks).
    #[error("Too many sales for {operator_id}; retry in {retry_after:?}")]
    RateLimited {
        operator_id: String,
        retry_after: Duration,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Any other core rule (cart limits and the like).
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => LedgerError::Validation(v),
            CoreError::RegisterClosed {
                operator_id,
                business_day,
            } => LedgerError::RegisterClosed {
                operator_id,
                business_day,
            },
            CoreError::SessionNotFound {
                operator_id,
                business_day,
            } => LedgerError::SessionNotFound {
                operator_id,
                business_day,
            },
            CoreError::Consistency { .. } => LedgerError::Consistency(err.to_string()),
            other => LedgerError::Core(other),
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        LedgerError::Persistence(err.into())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl LedgerError {
    /// Returns true if the same call may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::RateLimited { .. } | LedgerError::PendingSales { .. } => true,
            LedgerError::Persistence(e) => e.is_unavailable() || e.is_conflict(),
            _ => false,
        }
    }

    /// Returns true if the user has to act (fix the cart, open the register).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::RegisterClosed { .. }
                | LedgerError::SessionNotFound { .. }
                | LedgerError::Core(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> BusinessDayKey {
        "2026-03-01".parse().unwrap()
    }

    #[test]
    fn test_db_errors_map_to_store_errors() {
        assert!(StoreError::from(DbError::ConnectionFailed("refused".into())).is_unavailable());
        assert!(StoreError::from(DbError::PoolExhausted).is_unavailable());
        assert_eq!(
            StoreError::from(DbError::conflict("RegisterSession", "cajero-1@2026-03-01", 4)),
            StoreError::Conflict {
                key: "cajero-1@2026-03-01".into(),
                expected: 4
            }
        );
        assert!(matches!(
            StoreError::from(DbError::QueryFailed("syntax".into())),
            StoreError::Rejected(_)
        ));
    }

    #[test]
    fn test_core_errors_keep_their_category() {
        let closed: LedgerError = CoreError::register_closed("cajero-1", day()).into();
        assert!(matches!(closed, LedgerError::RegisterClosed { .. }));
        assert!(closed.to_string().contains("open the register first"));

        let invalid: LedgerError = CoreError::from(ValidationError::EmptyCart).into();
        assert!(matches!(invalid, LedgerError::Validation(ValidationError::EmptyCart)));

        let limit: LedgerError = CoreError::CartTooLarge { max: 100 }.into();
        assert!(matches!(limit, LedgerError::Core(_)));
        assert!(limit.is_user_error());
    }

    #[test]
    fn test_retryable() {
        assert!(LedgerError::Persistence(StoreError::unavailable("down")).is_retryable());
        assert!(LedgerError::RateLimited {
            operator_id: "cajero-1".into(),
            retry_after: Duration::from_millis(300),
        }
        .is_retryable());
        assert!(!LedgerError::Persistence(StoreError::Rejected("check".into())).is_retryable());
        assert!(!LedgerError::Validation(ValidationError::EmptyCart).is_retryable());
    }
}
