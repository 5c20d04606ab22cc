//! # Register Service
//!
//! The operations the sale screen calls. Pure rules come from tambo-core;
//! this layer reads and writes through the [`LedgerStore`], retries version
//! conflicts, takes the offline path when the store is down, and publishes
//! events.
//!
//! ## process_sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart ──► prepare_sale (pure) ── invalid ──► Validation (no I/O)        │
//! │               │                                                         │
//! │               ▼                                                         │
//! │          rate limiter ── burst ──► RateLimited                          │
//! │               │                                                         │
//! │               ▼                                                         │
//! │     ┌──► get_session ── unreachable ──► queue offline ──► Queued        │
//! │     │         │                                                         │
//! │     │         ├── none / closed ──► RegisterClosed (never auto-opens)   │
//! │     │         ▼                                                         │
//! │     │    apply_sale (pure) ──► commit_sale(sale, v+1, expected v)       │
//! │     │         │                                                         │
//! │     └─ conflict (≤ max_commit_attempts)                                 │
//! │               │                                                         │
//! │               ▼                                                         │
//! │        Committed + tickets + SaleCommitted event                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conflicts left after the last attempt surface as `Persistence(Conflict)`.

use std::time::Instant;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult, StoreError};
use crate::events::{EventFilter, LedgerEvent, Subscription};
use crate::offline::{ReplayReport, Resolution};
use crate::store::{CommitOutcome, LedgerStore};
use tambo_core::sale::{ensure_accepts, verify_sale_record};
use tambo_core::validation::validate_operator_id;
use tambo_core::{
    close_session, derive_tickets, open_session, prepare_sale, reconcile, render_ticket,
    summarize_day, BusinessDayKey, CartLine, DailyReport, PaymentMethod, Product, QueuedSale,
    RegisterSession, SaleRecord, SessionKey, SlidingWindowLimiter, Ticket, TimedCache,
    ValidationError,
};

/// Resolved journal rows kept this long before housekeeping deletes them.
const JOURNAL_RETENTION_DAYS: i64 = 7;

/// Where a processed sale ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Stored together with the session update.
    Committed,
    /// Waiting in the offline queue.
    Queued,
}

/// What the sale screen gets back from [`RegisterService::process_sale`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedSale {
    pub sale: SaleRecord,
    pub tickets: Vec<Ticket>,
    pub status: SaleStatus,
    /// The session after the sale; `None` while queued.
    pub session: Option<RegisterSession>,
}

enum ReplayStep {
    Applied {
        session: Option<RegisterSession>,
        duplicate: bool,
    },
    Rejected(String),
    Stop(String),
}

pub struct RegisterService {
    ctx: LedgerContext,
    limiter: Mutex<SlidingWindowLimiter<String>>,
    sessions: Mutex<TimedCache<SessionKey, RegisterSession>>,
    catalog: Mutex<TimedCache<(), Vec<Product>>>,
    sellers: Mutex<TimedCache<String, String>>,
    replay_lock: Mutex<()>,
}

impl RegisterService {
    pub fn new(ctx: LedgerContext) -> Self {
        let config = ctx.config();
        let limiter = SlidingWindowLimiter::new(config.limits.sales_per_window, config.sale_window());
        let sessions = TimedCache::new(config.session_ttl());
        let catalog = TimedCache::new(config.product_ttl());
        let sellers = TimedCache::new(config.product_ttl());

        RegisterService {
            limiter: Mutex::new(limiter),
            sessions: Mutex::new(sessions),
            catalog: Mutex::new(catalog),
            sellers: Mutex::new(sellers),
            replay_lock: Mutex::new(()),
            ctx,
        }
    }

    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    fn store(&self) -> &dyn LedgerStore {
        self.ctx.store().as_ref()
    }

    fn now_key(&self, operator_id: &str) -> SessionKey {
        let day = self.ctx.resolver().resolve(self.ctx.clock().now());
        SessionKey::new(operator_id, day)
    }

    fn max_attempts(&self) -> u32 {
        self.ctx.config().ledger.max_commit_attempts
    }

    fn instant(&self) -> Instant {
        self.ctx.clock().instant()
    }

    async fn remember_session(&self, session: &RegisterSession) {
        self.sessions
            .lock()
            .await
            .insert_at(session.key(), session.clone(), self.instant());
    }

    // =========================================================================
    // Register Lifecycle
    // =========================================================================

    /// Opens today's register for `operator_id`.
    ///
    /// Idempotent: if a session already exists for today (open or closed) it
    /// is returned unchanged. A store failure is surfaced; nothing is assumed
    /// to have been opened.
    pub async fn open_register(&self, operator_id: &str) -> LedgerResult<RegisterSession> {
        validate_operator_id(operator_id)?;
        let now = self.ctx.clock().now();
        let key = SessionKey::new(operator_id, self.ctx.resolver().resolve(now));

        for attempt in 1..=self.max_attempts() {
            let existing = self.store().get_session(&key).await?;
            let outcome = open_session(existing.as_ref(), operator_id, now, self.ctx.resolver());

            if !outcome.created {
                debug!(session = %key, open = outcome.session.is_open, "Register already has a session");
                self.remember_session(&outcome.session).await;
                return Ok(outcome.session);
            }

            match self.store().put_session(&outcome.session, None).await {
                Ok(()) => {
                    info!(session = %key, "Register opened");
                    self.remember_session(&outcome.session).await;
                    self.ctx.events().publish(LedgerEvent::SessionOpened {
                        session: outcome.session.clone(),
                    });
                    return Ok(outcome.session);
                }
                Err(e) if e.is_conflict() => {
                    // Opened elsewhere in the meantime; the next read returns it.
                    debug!(session = %key, attempt, "Open raced with another terminal");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.conflicts_exhausted(&key, 0))
    }

    /// Closes today's register for `operator_id`.
    pub async fn close_register(&self, operator_id: &str) -> LedgerResult<RegisterSession> {
        let key = self.now_key(operator_id);
        self.close_register_for(operator_id, key.business_day).await
    }

    /// Closes the register of a given business day, e.g. one left open
    /// past midnight.
    ///
    /// Offline sales queued for this register are replayed first; if any
    /// of them cannot be recorded yet the close fails with `PendingSales`.
    /// Fails with `SessionNotFound` if it was never opened and with
    /// `RegisterClosed` if it is already closed.
    pub async fn close_register_for(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> LedgerResult<RegisterSession> {
        validate_operator_id(operator_id)?;
        let key = SessionKey::new(operator_id, business_day);
        self.settle_queued_for(&key).await?;
        let mut expected = 0;

        for attempt in 1..=self.max_attempts() {
            let now = self.ctx.clock().now();
            let existing = self.store().get_session(&key).await?;
            let closed = close_session(existing.as_ref(), operator_id, business_day, now)?;
            let Some(prev) = existing else {
                return Err(LedgerError::SessionNotFound {
                    operator_id: operator_id.to_string(),
                    business_day,
                });
            };
            closed.ensure_successor_of(&prev)?;
            expected = prev.version;

            match self.store().put_session(&closed, Some(prev.version)).await {
                Ok(()) => {
                    info!(
                        session = %key,
                        total = %closed.total_sales,
                        cash = %closed.cash_sales,
                        transfer = %closed.transfer_sales,
                        sales = closed.sale_count,
                        "Register closed"
                    );
                    self.remember_session(&closed).await;
                    self.ctx.events().publish(LedgerEvent::SessionClosed {
                        session: closed.clone(),
                    });
                    return Ok(closed);
                }
                Err(e) if e.is_conflict() => {
                    debug!(session = %key, attempt, "Close lost a version race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.conflicts_exhausted(&key, expected))
    }

    /// Replays the queue if it holds sales for `key`, then refuses when
    /// some of them are still there.
    async fn settle_queued_for(&self, key: &SessionKey) -> LedgerResult<()> {
        let queue = self.ctx.queue();
        let queued_for = |items: Vec<QueuedSale>| {
            items
                .iter()
                .filter(|q| q.sale.session_key() == *key)
                .count()
        };

        if queued_for(queue.snapshot().await) == 0 {
            return Ok(());
        }

        let report = self.replay_pending().await?;
        let pending = queued_for(queue.snapshot().await);
        if pending > 0 {
            warn!(
                session = %key,
                pending,
                stopped = ?report.stopped,
                "Close refused, queued sales not recorded"
            );
            return Err(LedgerError::PendingSales {
                operator_id: key.operator_id.clone(),
                business_day: key.business_day,
                pending,
            });
        }

        debug!(session = %key, applied = report.applied, "Queued sales settled before close");
        Ok(())
    }

    /// Today's session for `operator_id`, if any.
    ///
    /// Served from the session cache while fresh. If the store is down, the
    /// last known state is returned; with nothing known the error surfaces.
    pub async fn get_current_session(
        &self,
        operator_id: &str,
    ) -> LedgerResult<Option<RegisterSession>> {
        validate_operator_id(operator_id)?;
        let key = self.now_key(operator_id);
        let now = self.instant();

        if let Some(session) = self.sessions.lock().await.get_at(&key, now) {
            return Ok(Some(session));
        }

        match self.store().get_session(&key).await {
            Ok(Some(session)) => {
                self.remember_session(&session).await;
                Ok(Some(session))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_unavailable() => {
                match self.sessions.lock().await.peek_stale(&key, now) {
                    Some((session, age)) => {
                        warn!(session = %key, ?age, "Store unreachable, using last known session");
                        Ok(Some(session))
                    }
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale against the operator's open register.
    ///
    /// The cart is validated before anything else. With the store
    /// unreachable the sale is queued and its tickets are still returned,
    /// unless the last known state of the register is closed.
    pub async fn process_sale(
        &self,
        cart: &[CartLine],
        operator_id: &str,
    ) -> LedgerResult<ProcessedSale> {
        let now = self.ctx.clock().now();
        let (sale, delta) = prepare_sale(cart, operator_id, now, self.ctx.resolver())?;
        self.check_rate(operator_id).await?;

        let key = sale.session_key();
        let mut expected = 0;

        for attempt in 1..=self.max_attempts() {
            let session = match self.store().get_session(&key).await {
                Ok(session) => session,
                Err(e) if e.is_unavailable() => return self.queue_offline(sale, e).await,
                Err(e) => return Err(e.into()),
            };

            ensure_accepts(session.as_ref(), &sale)?;
            let Some(current) = session else {
                return Err(LedgerError::RegisterClosed {
                    operator_id: key.operator_id,
                    business_day: key.business_day,
                });
            };
            let next = current.apply_sale(&delta)?;
            next.ensure_successor_of(&current)?;
            expected = current.version;

            match self.store().commit_sale(&sale, &next, current.version).await {
                Ok(outcome) => {
                    let session = match outcome {
                        CommitOutcome::Committed => {
                            info!(
                                sale_id = %sale.id,
                                session = %key,
                                total = %sale.total,
                                tickets = sale.promotion.total_ticket_count,
                                "Sale committed"
                            );
                            self.remember_session(&next).await;
                            self.ctx.events().publish(LedgerEvent::SaleCommitted {
                                sale_id: sale.id.clone(),
                                operator_id: sale.operator_id.clone(),
                                business_day: sale.business_day,
                                total: sale.total,
                                session_version: next.version,
                                replayed: false,
                            });
                            Some(next)
                        }
                        CommitOutcome::Duplicate => {
                            warn!(sale_id = %sale.id, "Sale id already stored, nothing written");
                            None
                        }
                    };

                    let seller = self.seller_name(operator_id).await;
                    return Ok(ProcessedSale {
                        tickets: derive_tickets(&sale, &seller),
                        sale,
                        status: SaleStatus::Committed,
                        session,
                    });
                }
                Err(e) if e.is_conflict() => {
                    debug!(sale_id = %sale.id, attempt, "Sale commit lost a version race, re-reading");
                }
                Err(e) if e.is_unavailable() => return self.queue_offline(sale, e).await,
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.conflicts_exhausted(&key, expected))
    }

    /// Builds a cart line from the catalog.
    pub async fn cart_line(
        &self,
        product_id: &str,
        quantity: i64,
        payment_method: PaymentMethod,
    ) -> LedgerResult<CartLine> {
        let cached = self
            .products()
            .await
            .ok()
            .and_then(|products| products.into_iter().find(|p| p.id == product_id));

        let product = match cached {
            Some(product) => Some(product),
            None => self.store().get_product_by_id(product_id).await?,
        };

        match product {
            Some(product) if product.is_active => {
                Ok(CartLine::from_product(&product, quantity, payment_method))
            }
            _ => Err(ValidationError::NotAllowed {
                field: "product_id".to_string(),
                allowed: vec!["an active catalog product".to_string()],
            }
            .into()),
        }
    }

    /// Tickets of a stored sale, for reprinting.
    pub async fn reprint_tickets(&self, sale_id: &str) -> LedgerResult<Vec<Ticket>> {
        let sale = self
            .store()
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Sale".to_string(),
                id: sale_id.to_string(),
            })?;
        let seller = self.seller_name(&sale.operator_id).await;
        Ok(derive_tickets(&sale, &seller))
    }

    /// Plain-text tickets laid out for the configured printer.
    pub fn render_tickets(&self, tickets: &[Ticket]) -> Vec<String> {
        let header = self.ctx.config().store_header();
        let width = self.ctx.config().printer.paper_width;
        tickets
            .iter()
            .map(|t| render_ticket(t, &header, width))
            .collect()
    }

    async fn check_rate(&self, operator_id: &str) -> LedgerResult<()> {
        let now = self.instant();
        self.limiter
            .lock()
            .await
            .check_at(&operator_id.to_string(), now)
            .map_err(|retry_after| {
                debug!(operator_id, ?retry_after, "Sale rate limited");
                LedgerError::RateLimited {
                    operator_id: operator_id.to_string(),
                    retry_after,
                }
            })
    }

    async fn queue_offline(
        &self,
        sale: SaleRecord,
        cause: StoreError,
    ) -> LedgerResult<ProcessedSale> {
        let key = sale.session_key();

        let last_known = self
            .sessions
            .lock()
            .await
            .peek_stale(&key, self.instant())
            .map(|(session, _)| session);
        if let Some(session) = &last_known {
            if !session.is_open {
                return Err(LedgerError::RegisterClosed {
                    operator_id: key.operator_id,
                    business_day: key.business_day,
                });
            }
        }

        let queued = QueuedSale {
            delta: sale.delta(),
            sale,
            queued_at: self.ctx.clock().now(),
            attempts: 0,
        };
        let pending = self.ctx.queue().push(queued.clone()).await;
        let sale = queued.sale;

        warn!(
            sale_id = %sale.id,
            session = %key,
            total = %sale.total,
            pending,
            cause = %cause,
            "Store unreachable, sale queued"
        );
        self.ctx.events().publish(LedgerEvent::SaleQueued {
            sale_id: sale.id.clone(),
            operator_id: sale.operator_id.clone(),
            business_day: sale.business_day,
            total: sale.total,
            pending,
        });

        let seller = self.seller_name(&sale.operator_id).await;
        Ok(ProcessedSale {
            tickets: derive_tickets(&sale, &seller),
            sale,
            status: SaleStatus::Queued,
            session: None,
        })
    }

    /// Display name printed on tickets. Falls back to the operator id.
    async fn seller_name(&self, operator_id: &str) -> String {
        let now = self.instant();
        let key = operator_id.to_string();
        if let Some(name) = self.sellers.lock().await.get_at(&key, now) {
            return name;
        }

        match self.store().get_operator(operator_id).await {
            Ok(Some(operator)) => {
                self.sellers
                    .lock()
                    .await
                    .insert_at(key, operator.display_name.clone(), now);
                operator.display_name
            }
            Ok(None) => operator_id.to_string(),
            Err(e) => {
                debug!(operator_id, error = %e, "Seller lookup failed");
                self.sellers
                    .lock()
                    .await
                    .peek_stale(&key, now)
                    .map(|(name, _)| name)
                    .unwrap_or(key)
            }
        }
    }

    fn conflicts_exhausted(&self, key: &SessionKey, expected: i64) -> LedgerError {
        warn!(session = %key, attempts = self.max_attempts(), "Giving up after version conflicts");
        LedgerError::Persistence(StoreError::Conflict {
            key: key.to_string(),
            expected,
        })
    }

    // =========================================================================
    // Offline Replay
    // =========================================================================

    /// Replays queued sales oldest first. See [`crate::offline`].
    pub async fn replay_pending(&self) -> LedgerResult<ReplayReport> {
        let _guard = self.replay_lock.lock().await;
        let queue = self.ctx.queue();
        let mut report = ReplayReport::default();

        while let Some(item) = queue.front().await {
            let sale_id = item.sale.id.clone();
            match self.replay_one(&item).await {
                ReplayStep::Applied { session, duplicate } => {
                    queue.resolve(&sale_id, &Resolution::Applied).await;
                    if duplicate {
                        debug!(sale_id = %sale_id, "Queued sale was already stored");
                        report.duplicates += 1;
                        continue;
                    }
                    report.applied += 1;
                    info!(sale_id = %sale_id, "Queued sale committed");
                    if let Some(session) = session {
                        self.remember_session(&session).await;
                        self.ctx.events().publish(LedgerEvent::SaleCommitted {
                            sale_id,
                            operator_id: item.sale.operator_id.clone(),
                            business_day: item.sale.business_day,
                            total: item.sale.total,
                            session_version: session.version,
                            replayed: true,
                        });
                    }
                }
                ReplayStep::Rejected(reason) => {
                    warn!(sale_id = %sale_id, reason = %reason, "Queued sale rejected");
                    queue
                        .resolve(&sale_id, &Resolution::Rejected(reason.clone()))
                        .await;
                    report.rejected += 1;
                    self.ctx.events().publish(LedgerEvent::SaleRejected {
                        sale_id,
                        operator_id: item.sale.operator_id.clone(),
                        business_day: item.sale.business_day,
                        reason,
                    });
                }
                ReplayStep::Stop(reason) => {
                    debug!(sale_id = %sale_id, reason = %reason, "Replay paused");
                    queue.record_attempt(&sale_id, &reason).await;
                    report.stopped = Some(reason);
                    break;
                }
            }
        }

        report.remaining = queue.len().await;
        Ok(report)
    }

    async fn replay_one(&self, item: &QueuedSale) -> ReplayStep {
        let sale = &item.sale;

        if verify_sale_record(sale).is_none() || item.delta != sale.delta() {
            return ReplayStep::Rejected("queued sale is internally inconsistent".to_string());
        }

        // A commit whose answer was lost is already in the store.
        match self.store().get_sale(&sale.id).await {
            Ok(Some(_)) => {
                return ReplayStep::Applied {
                    session: None,
                    duplicate: true,
                }
            }
            Ok(None) => {}
            Err(e) => return ReplayStep::Stop(e.to_string()),
        }

        let key = sale.session_key();
        for attempt in 1..=self.max_attempts() {
            let current = match self.store().get_session(&key).await {
                Ok(Some(session)) => session,
                Ok(None) => {
                    return ReplayStep::Rejected(format!("no register session for {}", key))
                }
                Err(e) => return ReplayStep::Stop(e.to_string()),
            };
            if !current.is_open {
                return ReplayStep::Rejected(format!(
                    "register {} was closed before the sale could be recorded",
                    key
                ));
            }

            let next = match current.apply_sale(&item.delta) {
                Ok(next) => next,
                Err(e) => return ReplayStep::Rejected(e.to_string()),
            };

            match self.store().commit_sale(sale, &next, current.version).await {
                Ok(CommitOutcome::Committed) => {
                    return ReplayStep::Applied {
                        session: Some(next),
                        duplicate: false,
                    }
                }
                Ok(CommitOutcome::Duplicate) => {
                    return ReplayStep::Applied {
                        session: None,
                        duplicate: true,
                    }
                }
                Err(e) if e.is_conflict() => {
                    debug!(sale_id = %sale.id, attempt, "Replay lost a version race, re-reading");
                }
                Err(e) if e.is_unavailable() => return ReplayStep::Stop(e.to_string()),
                Err(e) => return ReplayStep::Rejected(e.to_string()),
            }
        }

        ReplayStep::Stop(format!("{} kept changing concurrently", key))
    }

    /// Sales waiting in the offline queue, oldest first.
    pub async fn pending_sales(&self) -> Vec<QueuedSale> {
        self.ctx.queue().snapshot().await
    }

    // =========================================================================
    // Catalog, Reports, Events
    // =========================================================================

    /// Active products, cached for `[cache] product_ttl_secs`.
    ///
    /// With the store down, the last loaded catalog is served.
    pub async fn products(&self) -> LedgerResult<Vec<Product>> {
        let now = self.instant();
        if let Some(products) = self.catalog.lock().await.get_at(&(), now) {
            return Ok(products);
        }

        match self.store().get_products().await {
            Ok(products) => {
                debug!(count = products.len(), "Catalog loaded");
                self.catalog.lock().await.insert_at((), products.clone(), now);
                Ok(products)
            }
            Err(e) if e.is_unavailable() => match self.catalog.lock().await.peek_stale(&(), now) {
                Some((products, age)) => {
                    warn!(?age, "Store unreachable, serving cached catalog");
                    Ok(products)
                }
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the cached catalog (after a price change, say).
    pub async fn invalidate_products(&self) {
        self.catalog.lock().await.invalidate(&());
    }

    pub async fn daily_report(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> LedgerResult<DailyReport> {
        let sales = self.store().sales_for_day(operator_id, business_day).await?;
        Ok(summarize_day(operator_id, business_day, &sales))
    }

    /// Checks the session counters against its stored sales.
    pub async fn reconcile_day(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> LedgerResult<RegisterSession> {
        let key = SessionKey::new(operator_id, business_day);
        let session = self
            .store()
            .get_session(&key)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound {
                operator_id: operator_id.to_string(),
                business_day,
            })?;
        let sales = self.store().sales_for_day(operator_id, business_day).await?;
        reconcile(&session, &sales)?;
        Ok(session)
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.ctx.events().subscribe(filter)
    }

    /// Periodic cleanup: limiter history, expired cache entries and old
    /// journal rows.
    pub async fn housekeeping(&self) {
        let now = self.instant();
        self.limiter.lock().await.prune(now);
        let expired = self.sessions.lock().await.purge_expired(now)
            + self.sellers.lock().await.purge_expired(now);

        let cutoff = self.ctx.clock().now() - ChronoDuration::days(JOURNAL_RETENTION_DAYS);
        match self.ctx.queue().purge_journal(cutoff).await {
            Ok(purged) if purged > 0 => debug!(purged, expired, "Housekeeping done"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to purge the offline journal"),
        }
    }
}
