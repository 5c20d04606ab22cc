//! # tambo-core: Pure Business Logic for Tambo POS
//!
//! This crate is the **heart** of Tambo POS. It contains the register/sales
//! ledger rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tambo POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (React)                             │   │
//! │  │    Catalog ──► Cart ──► Cobrar ──► Ticket printer               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tambo-ledger (RegisterService)                 │   │
//! │  │    open_register, process_sale, close_register, replay         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tambo-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌───────────┐ ┌───────────┐ ┌──────────────┐  │   │
//! │  │   │business_day│ │   sale    │ │ register  │ │   ticket     │  │   │
//! │  │   │ UTC-5 key  │ │ totals    │ │ open/close│ │ per unit     │  │   │
//! │  │   │            │ │ promotion │ │ apply     │ │ + free units │  │   │
//! │  │   └────────────┘ └───────────┘ └───────────┘ └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO SYSTEM CLOCK          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`business_day`] - Instant → `YYYY-MM-DD` business-day key (fixed offset)
//! - [`cart`] - Client-local cart editing
//! - [`sale`] - Totals by payment method, sale record + ledger delta
//! - [`promotion`] - The 10+1 rule and free-ticket allocation
//! - [`register`] - Register session state machine
//! - [`ticket`] - Ticket derivation and thermal text layout
//! - [`report`] - Daily summaries and ledger reconciliation
//! - [`limiter`] / [`cache`] - Sliding-window limiter, time-boxed cache
//! - [`money`], [`types`], [`error`], [`validation`]
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; "now" is always a parameter
//! 2. **Integer Money**: all monetary values are céntimos (i64)
//! 3. **Explicit Errors**: typed errors, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tambo_core::{compute_promotion, CartLine, Money, PaymentMethod};
//!
//! let cart = vec![CartLine::new("p-1", "Chicha morada", Money::from_cents(500), 23, PaymentMethod::Cash)];
//! let promo = compute_promotion(&cart).unwrap();
//! assert_eq!(promo.free_item_count, 2);
//! assert_eq!(promo.total_ticket_count, 25);
//!
//! let resolver = tambo_core::BusinessDayResolver::peru();
//! let late = Utc.with_ymd_and_hms(2026, 3, 2, 4, 59, 59).unwrap(); // 23:59:59 in Lima
//! assert_eq!(resolver.resolve(late).to_string(), "2026-03-01");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod business_day;
pub mod cache;
pub mod cart;
pub mod error;
pub mod limiter;
pub mod money;
pub mod promotion;
pub mod register;
pub mod report;
pub mod sale;
pub mod ticket;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use business_day::{BusinessDayKey, BusinessDayResolver};
pub use cache::TimedCache;
pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use limiter::SlidingWindowLimiter;
pub use money::Money;
pub use promotion::{allocate_free_items, compute_promotion};
pub use register::{close_session, open_session, OpenOutcome, RegisterState};
pub use report::{reconcile, summarize_day, DailyReport, ProductRanking};
pub use sale::{build_sale_record, compute_totals, prepare_sale};
pub use ticket::{derive_tickets, render_ticket, StoreHeader};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Paid units needed to earn one free ticket (the "10+1" promotion).
pub const PROMOTION_THRESHOLD: i64 = 10;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in the cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum tickets (paid plus free) a single sale may print.
///
/// Bounds the sale itself, whatever built the cart: a sale over this limit
/// is a `ValidationError` before anything is stored.
pub const MAX_TICKETS_PER_SALE: i64 = 5_000;
