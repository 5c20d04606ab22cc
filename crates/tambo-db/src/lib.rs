//! # tambo-db: Database Layer for Tambo POS
//!
//! SQLite storage for the register ledger, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tambo POS Data Flow                              │
//! │                                                                         │
//! │  RegisterService (tambo-ledger)                                        │
//! │       │  LedgerStore trait                                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tambo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ Product        │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ Operator       │    │ 001_init.sql │  │   │
//! │  │   │  WAL, FKs on  │    │ Session / Sale │    │              │  │   │
//! │  │   │               │    │ PendingSale    │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tambo.db (platform data dir)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tambo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tambo.db")).await?;
//! let catalog = db.products().list_active(200).await?;
//! let session = db.sessions().get(&SessionKey::new("cajero-1", day)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::operator::OperatorRepository;
pub use repository::pending::{PendingSale, PendingSaleRepository, PendingStatus};
pub use repository::product::ProductRepository;
pub use repository::sale::{CommitResult, SaleRepository};
pub use repository::session::SessionRepository;
