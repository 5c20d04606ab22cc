//! # Offline Queue & Replay Worker
//!
//! A sale made while the store is unreachable is still computed and its
//! tickets printed; the record and its ledger delta wait here until the store
//! answers again.
//!
//! ## Replay Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Offline Replay                                  │
//! │                                                                         │
//! │  process_sale ──store down──► OfflineQueue (FIFO, deduped by sale id)   │
//! │                                   │   └─► pending_sales (journal, opt.) │
//! │                                   │                                     │
//! │  ReplayWorker tick ──────────────►│ front of queue                      │
//! │                                   ▼                                     │
//! │                     already stored? ──yes──► applied (duplicate)        │
//! │                                   │                                     │
//! │                     read session ─┼── unreachable ──► stop, next tick   │
//! │                                   │                                     │
//! │                     missing / closed ──► rejected + SaleRejected event  │
//! │                                   │      (the register is not reopened) │
//! │                                   ▼                                     │
//! │                     commit_sale(v) ── conflict ──► re-read, retry       │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                     applied + SaleCommitted { replayed: true }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replay stops at the first sale it cannot decide, so later sales never
//! overtake an earlier one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::service::RegisterService;
use tambo_core::QueuedSale;
use tambo_db::PendingSaleRepository;

// =============================================================================
// Queue
// =============================================================================

/// How a queued sale left the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Rejected(String),
}

/// Result of one pass over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: usize,
    /// Sales the store already had (an earlier commit whose answer was lost).
    pub duplicates: usize,
    pub rejected: usize,
    /// Still queued after the pass.
    pub remaining: usize,
    /// Why the pass ended early, if it did.
    pub stopped: Option<String>,
}

impl ReplayReport {
    pub fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}

pub struct OfflineQueue {
    items: Mutex<VecDeque<QueuedSale>>,
    journal: Option<PendingSaleRepository>,
}

impl OfflineQueue {
    /// A queue kept in memory only.
    pub fn new() -> Self {
        OfflineQueue {
            items: Mutex::new(VecDeque::new()),
            journal: None,
        }
    }

    /// A queue mirrored to the local `pending_sales` table.
    pub fn with_journal(journal: PendingSaleRepository) -> Self {
        OfflineQueue {
            items: Mutex::new(VecDeque::new()),
            journal: Some(journal),
        }
    }

    pub fn is_journaled(&self) -> bool {
        self.journal.is_some()
    }

    /// Appends a sale; returns the queue length.
    ///
    /// A sale id already queued is not added twice. A journal failure is
    /// logged and the sale stays queued in memory.
    pub async fn push(&self, queued: QueuedSale) -> usize {
        let mut items = self.items.lock().await;
        if items.iter().any(|q| q.sale.id == queued.sale.id) {
            debug!(sale_id = %queued.sale.id, "Sale already queued");
            return items.len();
        }

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.enqueue(&queued).await {
                error!(sale_id = %queued.sale.id, error = %e, "Failed to journal queued sale");
            }
        }

        items.push_back(queued);
        items.len()
    }

    /// Loads journaled sales left over from a previous run.
    ///
    /// Returns how many were added.
    pub async fn restore(&self, limit: u32) -> LedgerResult<usize> {
        let Some(journal) = &self.journal else {
            return Ok(0);
        };

        let pending = journal.get_pending(limit).await?;
        let mut items = self.items.lock().await;
        let mut added = 0;
        for row in pending {
            if items.iter().any(|q| q.sale.id == row.queued.sale.id) {
                continue;
            }
            items.push_back(row.queued);
            added += 1;
        }

        if added > 0 {
            info!(count = added, "Restored queued sales from journal");
        }
        Ok(added)
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Copy of the queue, oldest first.
    pub async fn snapshot(&self) -> Vec<QueuedSale> {
        self.items.lock().await.iter().cloned().collect()
    }

    pub(crate) async fn front(&self) -> Option<QueuedSale> {
        self.items.lock().await.front().cloned()
    }

    /// Removes `sale_id` from the queue and journals the outcome.
    pub(crate) async fn resolve(&self, sale_id: &str, resolution: &Resolution) {
        self.items.lock().await.retain(|q| q.sale.id != sale_id);

        let Some(journal) = &self.journal else {
            return;
        };
        let result = match resolution {
            Resolution::Applied => journal.mark_applied(sale_id).await,
            Resolution::Rejected(reason) => journal.mark_rejected(sale_id, reason).await,
        };
        if let Err(e) = result {
            error!(sale_id, error = %e, "Failed to journal replay outcome");
        }
    }

    /// Counts a replay attempt that could not decide the sale.
    pub(crate) async fn record_attempt(&self, sale_id: &str, reason: &str) {
        {
            let mut items = self.items.lock().await;
            if let Some(item) = items.iter_mut().find(|q| q.sale.id == sale_id) {
                item.attempts += 1;
            }
        }

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_attempt(sale_id, reason).await {
                error!(sale_id, error = %e, "Failed to journal replay attempt");
            }
        }
    }

    /// Deletes journal rows resolved before `before`.
    pub async fn purge_journal(&self, before: DateTime<Utc>) -> LedgerResult<u64> {
        match &self.journal {
            Some(journal) => Ok(journal.purge_resolved(before).await?),
            None => Ok(0),
        }
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Replay Worker
// =============================================================================

/// Background task that drains the offline queue on an interval.
pub struct ReplayWorker {
    service: Arc<RegisterService>,
    interval: Duration,
    wake_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the replay worker.
#[derive(Clone)]
pub struct ReplayWorkerHandle {
    wake_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ReplayWorkerHandle {
    /// Asks for a pass now instead of at the next tick.
    pub fn replay_now(&self) {
        // A wake-up already waiting covers this one.
        let _ = self.wake_tx.try_send(());
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LedgerError::Config("Replay worker already stopped".into()))
    }
}

impl ReplayWorker {
    /// Creates a worker and its handle. The interval comes from
    /// `[ledger] replay_interval_secs`.
    pub fn new(service: Arc<RegisterService>) -> (Self, ReplayWorkerHandle) {
        let interval = service.context().config().replay_interval();
        Self::with_interval(service, interval)
    }

    pub fn with_interval(
        service: Arc<RegisterService>,
        interval: Duration,
    ) -> (Self, ReplayWorkerHandle) {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = ReplayWorker {
            service,
            interval,
            wake_rx,
            shutdown_rx,
        };
        let handle = ReplayWorkerHandle {
            wake_tx,
            shutdown_tx,
        };

        (worker, handle)
    }

    /// Runs the replay loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "Replay worker starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.pass().await;
                    self.service.housekeeping().await;
                }

                Some(()) = self.wake_rx.recv() => {
                    self.pass().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Replay worker shutting down");
                    break;
                }
            }
        }

        info!("Replay worker stopped");
    }

    async fn pass(&self) {
        match self.service.replay_pending().await {
            Ok(report) if report == ReplayReport::default() => {
                debug!("Offline queue empty");
            }
            Ok(report) => {
                info!(
                    applied = report.applied,
                    duplicates = report.duplicates,
                    rejected = report.rejected,
                    remaining = report.remaining,
                    stopped = report.stopped.as_deref().unwrap_or(""),
                    "Replay pass finished"
                );
            }
            Err(e) => error!(error = %e, "Replay pass failed"),
        }
    }
}
