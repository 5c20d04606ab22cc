//! # Domain Types
//!
//! Core domain types used throughout Tambo POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   SaleRecord    │   │ RegisterSession │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id (UUID)      │   │  operator_id ┐  │       │
//! │  │  name           │   │  lines[]        │   │  business_day┘key│      │
//! │  │  price_cents    │   │  total          │   │  is_open        │       │
//! │  └────────┬────────┘   │  by_method      │   │  current_amount │       │
//! │           │ snapshot   │  promotion      │   │  cash / transfer│       │
//! │           ▼            └────────┬────────┘   └────────▲────────┘       │
//! │  ┌─────────────────┐            │ LedgerDelta         │                │
//! │  │    CartLine     │────────────┴─────────────────────┘                │
//! │  │  qty ≥ 1, method│                                                    │
//! │  └─────────────────┘   Ticket: derived per unit (+ free units)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::business_day::BusinessDayKey;
use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Payment Method
// =============================================================================

/// How a line was paid.
///
/// The ledger has exactly two buckets. Wallet apps (Yape, Plin) are bank
/// transfers as far as the drawer is concerned and parse as `Transfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum PaymentMethod {
    /// Physical cash; the only method that moves `current_amount`.
    Cash,
    /// Bank transfer or wallet payment.
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }

    /// Label printed on tickets.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Transfer => "Transferencia",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" | "efectivo" => Ok(PaymentMethod::Cash),
            "transfer" | "transferencia" | "yape" | "plin" => Ok(PaymentMethod::Transfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["cash".to_string(), "transfer".to_string()],
            }),
        }
    }
}

// =============================================================================
// Operator
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum OperatorRole {
    Cashier,
    Admin,
}

impl OperatorRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperatorRole::Cashier => "cashier",
            OperatorRole::Admin => "admin",
        }
    }
}

impl FromStr for OperatorRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(OperatorRole::Cashier),
            "admin" => Ok(OperatorRole::Admin),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["cashier".to_string(), "admin".to_string()],
            }),
        }
    }
}

/// A person who works a register. Their display name is printed on tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Operator {
    pub id: String,
    pub display_name: String,
    pub role: OperatorRole,
    pub is_active: bool,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog. Read-only to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Display name, snapshotted into every sale line.
    pub name: String,

    /// Price in céntimos.
    pub price_cents: i64,

    /// Catalog grouping ("Bebidas", "Snacks", ...).
    pub category: Option<String>,

    /// Soft-delete flag; inactive products are hidden from the catalog.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of a cart: a product snapshot, a quantity and how it is paid.
///
/// The same product may appear twice if paid with two methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    /// Product name at add-time (frozen).
    pub name: String,
    /// Unit price at add-time (frozen).
    pub unit_price: Money,
    pub quantity: i64,
    pub payment_method: PaymentMethod,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            payment_method,
        }
    }

    /// Snapshots a catalog product into a cart line.
    pub fn from_product(product: &Product, quantity: i64, payment_method: PaymentMethod) -> Self {
        Self::new(
            product.id.clone(),
            product.name.clone(),
            product.price(),
            quantity,
            payment_method,
        )
    }

    /// Unit price × quantity, `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }
}

// =============================================================================
// Totals, Promotion, Delta
// =============================================================================

/// Subtotals per ledger bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub cash: Money,
    pub transfer: Money,
}

impl PaymentBreakdown {
    pub fn get(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::Cash => self.cash,
            PaymentMethod::Transfer => self.transfer,
        }
    }

    pub(crate) fn slot_mut(&mut self, method: PaymentMethod) -> &mut Money {
        match method {
            PaymentMethod::Cash => &mut self.cash,
            PaymentMethod::Transfer => &mut self.transfer,
        }
    }
}

/// Result of `compute_totals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub total: Money,
    pub by_method: PaymentBreakdown,
}

/// The 10+1 promotion applied to one sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PromotionSummary {
    pub paid_item_count: i64,
    pub free_item_count: i64,
    pub total_ticket_count: i64,
}

/// Additive change a committed sale applies to its register session.
///
/// All components are non-negative. Only `cash_delta` touches cash on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerDelta {
    pub total_delta: Money,
    pub cash_delta: Money,
    pub transfer_delta: Money,
}

impl From<&SaleTotals> for LedgerDelta {
    fn from(totals: &SaleTotals) -> Self {
        LedgerDelta {
            total_delta: totals.total,
            cash_delta: totals.by_method.cash,
            transfer_delta: totals.by_method.transfer,
        }
    }
}

// =============================================================================
// Sale Record
// =============================================================================

/// A line of a committed sale. Uses the snapshot pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub payment_method: PaymentMethod,
    pub line_total: Money,
}

/// An immutable sale.
///
/// `total == Σ line_total`, `total == by_method.cash + by_method.transfer`,
/// and the promotion follows the 10+1 rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRecord {
    /// UUID v4, generated on the client so offline sales keep their id.
    pub id: String,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub by_method: PaymentBreakdown,
    pub operator_id: String,
    pub business_day: BusinessDayKey,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub promotion: PromotionSummary,
}

impl SaleRecord {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.operator_id.clone(), self.business_day)
    }

    pub fn delta(&self) -> LedgerDelta {
        LedgerDelta {
            total_delta: self.total,
            cash_delta: self.by_method.cash,
            transfer_delta: self.by_method.transfer,
        }
    }
}

// =============================================================================
// Register Session
// =============================================================================

/// Identity of a register session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionKey {
    pub operator_id: String,
    pub business_day: BusinessDayKey,
}

impl SessionKey {
    pub fn new(operator_id: impl Into<String>, business_day: BusinessDayKey) -> Self {
        Self {
            operator_id: operator_id.into(),
            business_day,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.operator_id, self.business_day)
    }
}

/// The daily cash drawer of one operator.
///
/// ## Lifecycle
/// ```text
///   NoSession ──open──► Open ──apply_sale*──► Open ──close──► Closed
///                        ▲                                     │
///                        └──── open again: returns as-is ◄─────┘
/// ```
///
/// Counters only ever grow. See [`crate::register`] for the transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSession {
    pub operator_id: String,
    pub business_day: BusinessDayKey,
    pub is_open: bool,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub initial_amount: Money,
    /// Cash on hand: `initial_amount + cash_sales`.
    pub current_amount: Money,
    /// `cash_sales + transfer_sales`.
    pub total_sales: Money,
    pub cash_sales: Money,
    pub transfer_sales: Money,
    pub sale_count: i64,
    /// Bumped by every persisted mutation; used for optimistic concurrency.
    pub version: i64,
}

impl RegisterSession {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.operator_id.clone(), self.business_day)
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// A printed per-unit slip. Derived from a `SaleRecord`, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Ticket {
    /// 1-based position within the sale.
    pub sequence: i64,
    /// Total tickets in the sale.
    pub of: i64,
    pub product_id: String,
    pub product_name: String,
    /// Zero for free tickets.
    pub price: Money,
    pub payment_method: PaymentMethod,
    pub payment_label: String,
    pub seller_name: String,
    pub is_free: bool,
    pub sale_id: String,
    pub business_day: BusinessDayKey,
}

// =============================================================================
// Queued Sale
// =============================================================================

/// A sale computed while the store was unreachable, waiting for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QueuedSale {
    pub sale: SaleRecord,
    pub delta: LedgerDelta,
    #[ts(as = "String")]
    pub queued_at: DateTime<Utc>,
    pub attempts: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
