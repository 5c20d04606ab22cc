//! # tambo-ledger: Register & Sales Ledger for Tambo POS
//!
//! The layer the sale screen talks to. Pure rules live in `tambo-core`;
//! this crate adds persistence through a [`LedgerStore`], an offline queue
//! with replay, rate limiting, caches and change events.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           tambo-ledger                                  │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   RegisterService (service.rs)                   │  │
//! │  │                                                                  │  │
//! │  │  open_register / close_register / process_sale / reports         │  │
//! │  │  sliding-window limiter, session + catalog caches                │  │
//! │  └───────┬──────────────────────┬────────────────────────┬──────────┘  │
//! │          ▼                      ▼                        ▼             │
//! │  ┌────────────────┐   ┌──────────────────┐   ┌──────────────────────┐  │
//! │  │  LedgerStore   │   │  OfflineQueue    │   │  EventHub            │  │
//! │  │                │   │  + ReplayWorker  │   │                      │  │
//! │  │ SqliteStore    │   │                  │   │ broadcast of         │  │
//! │  │ MemoryStore    │   │ FIFO, journaled  │   │ LedgerEvent with     │  │
//! │  │                │   │ in pending_sales │   │ per-subscriber filter│  │
//! │  └────────────────┘   └──────────────────┘   └──────────────────────┘  │
//! │                                                                         │
//! │  LedgerContext bundles store, clock, config, resolver, events, queue.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`clock`] - Wall/monotonic time source, manual clock for tests
//! - [`config`] - `ledger.toml` loading, validation, env overrides
//! - [`context`] - Dependency bundle handed to the service
//! - [`error`] - Store and ledger error types
//! - [`events`] - Change events and subscriptions
//! - [`offline`] - Offline queue and replay worker
//! - [`service`] - `RegisterService`
//! - [`store`] - `LedgerStore` trait and its implementations
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tambo_ledger::{LedgerConfig, LedgerContext, RegisterService, ReplayWorker};
//!
//! tambo_ledger::telemetry::init_tracing();
//! let config = LedgerConfig::load_or_default(None);
//! let ctx = LedgerContext::open(config).await?;
//! let service = Arc::new(RegisterService::new(ctx));
//!
//! let (worker, handle) = ReplayWorker::new(service.clone());
//! tokio::spawn(worker.run());
//!
//! service.open_register("cajero-1").await?;
//! let sale = service.process_sale(&cart, "cajero-1").await?;
//! for text in service.render_tickets(&sale.tickets) {
//!     println!("{text}");
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod offline;
pub mod service;
pub mod store;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use context::{LedgerContext, LedgerContextBuilder};
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use events::{EventFilter, EventHub, LedgerEvent, Subscription};
pub use offline::{OfflineQueue, ReplayReport, ReplayWorker, ReplayWorkerHandle};
pub use service::{ProcessedSale, RegisterService, SaleStatus};
pub use store::{CommitOutcome, LedgerStore, MemoryStore, SqliteStore};
