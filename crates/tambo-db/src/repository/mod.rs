//! # Repository Module
//!
//! One repository per table family. Each holds a cloned `SqlitePool`, so
//! they are cheap to create per call (`db.sessions().get(..)`).
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────────┐
//! │ Repository               │ Tables                                       │
//! ├──────────────────────────┼──────────────────────────────────────────────┤
//! │ ProductRepository        │ products                                     │
//! │ OperatorRepository       │ operators                                    │
//! │ SessionRepository        │ register_sessions                            │
//! │ SaleRepository           │ sales, sale_lines (+ register_sessions on    │
//! │                          │ commit, in one transaction)                  │
//! │ PendingSaleRepository    │ pending_sales                                │
//! └──────────────────────────┴──────────────────────────────────────────────┘
//! ```

pub mod operator;
pub mod pending;
pub mod product;
pub mod sale;
pub mod session;
