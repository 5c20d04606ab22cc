//! # Error Types
//!
//! Domain-specific error types for tambo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tambo-core errors (this file)                                         │
//! │  ├── CoreError        - Register / ledger rule violations              │
//! │  └── ValidationError  - Malformed cart or input                        │
//! │                                                                         │
//! │  tambo-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tambo-ledger errors                                                   │
//! │  ├── StoreError       - Persistence collaborator boundary              │
//! │  └── LedgerError      - What the UI sees                               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → Frontend            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (operator, business day, field)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::business_day::BusinessDayKey;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale or close was attempted against a session that is not open.
    ///
    /// ## User Workflow
    /// ```text
    /// Cobrar (cart with 3 items)
    ///      │
    ///      ▼
    /// Session for (cajero-1, 2026-03-01)? ── none / closed
    ///      │
    ///      ▼
    /// RegisterClosed { operator_id, business_day }
    ///      │
    ///      ▼
    /// UI shows: "Open the register first"
    /// ```
    ///
    /// The register is never opened on the user's behalf.
    #[error("Register for {operator_id} on {business_day} is not open; open the register first")]
    RegisterClosed {
        operator_id: String,
        business_day: BusinessDayKey,
    },

    /// Close requested for a business day that was never opened.
    #[error("No register session for {operator_id} on {business_day}")]
    SessionNotFound {
        operator_id: String,
        business_day: BusinessDayKey,
    },

    /// A successor session state would break monotonicity or the
    /// cash/transfer identities.
    #[error("Ledger consistency violation for {operator_id} on {business_day}: {reason}")]
    Consistency {
        operator_id: String,
        business_day: BusinessDayKey,
        reason: String,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Product is not in the cart.
    #[error("Product {0} not in cart")]
    NotInCart(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn register_closed(operator_id: impl Into<String>, business_day: BusinessDayKey) -> Self {
        CoreError::RegisterClosed {
            operator_id: operator_id.into(),
            business_day,
        }
    }

    pub fn consistency(
        operator_id: impl Into<String>,
        business_day: BusinessDayKey,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::Consistency {
            operator_id: operator_id.into(),
            business_day,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs and never partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., timestamp without offset, bad date key).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Amount arithmetic left the representable range.
    #[error("{field} overflowed")]
    Overflow { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
