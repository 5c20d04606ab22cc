//! # Ledger Store
//!
//! The narrow async boundary between the ledger and whatever persists it.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         LedgerStore                                     │
//! │                                                                         │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────────────┐ │
//! │  │ SqliteStore                 │   │ MemoryStore                     │ │
//! │  │                             │   │                                 │ │
//! │  │ tambo-db repositories       │   │ one RwLock over all state       │ │
//! │  │ commit = SQL transaction    │   │ commit = one write guard        │ │
//! │  │ version-guarded UPDATE      │   │ same version rules              │ │
//! │  │                             │   │ set_online(false) for offline   │ │
//! │  └─────────────────────────────┘   └─────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contract
//! - `put_session(s, None)` creates; an existing row is a `Conflict`.
//! - `put_session(s, Some(v))` replaces only a row still at version `v`;
//!   `Conflict` if it moved on, `NotFound` if there is none.
//! - `commit_sale` writes the sale and the successor session together or not
//!   at all. A sale id already stored comes back as
//!   [`CommitOutcome::Duplicate`] and changes nothing.
//! - Sales are append-only.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreResult;
use tambo_core::{BusinessDayKey, Operator, Product, RegisterSession, SaleRecord, SessionKey};

/// What happened to a sale handed to [`LedgerStore::commit_sale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Already stored; nothing was written.
    Duplicate,
}

impl From<tambo_db::CommitResult> for CommitOutcome {
    fn from(result: tambo_db::CommitResult) -> Self {
        match result {
            tambo_db::CommitResult::Committed => CommitOutcome::Committed,
            tambo_db::CommitResult::Duplicate => CommitOutcome::Duplicate,
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_session(&self, key: &SessionKey) -> StoreResult<Option<RegisterSession>>;

    async fn put_session(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> StoreResult<()>;

    async fn commit_sale(
        &self,
        sale: &SaleRecord,
        session: &RegisterSession,
        expected_version: i64,
    ) -> StoreResult<CommitOutcome>;

    /// Active catalog, by category then name.
    async fn get_products(&self) -> StoreResult<Vec<Product>>;

    async fn get_product_by_id(&self, id: &str) -> StoreResult<Option<Product>>;

    async fn get_operator(&self, id: &str) -> StoreResult<Option<Operator>>;

    async fn get_sale(&self, id: &str) -> StoreResult<Option<SaleRecord>>;

    /// Sales of one register session in commit order.
    async fn sales_for_day(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> StoreResult<Vec<SaleRecord>>;
}
