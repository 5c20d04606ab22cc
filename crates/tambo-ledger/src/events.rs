//! # Ledger Events
//!
//! Change notifications for screens that show the register (the cashier's
//! drawer panel, the admin's day overview).
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RegisterService ──publish──► EventHub (tokio broadcast, 256 slots)    │
//! │                                   │                                     │
//! │               ┌───────────────────┼───────────────────┐                │
//! │               ▼                   ▼                   ▼                 │
//! │        Subscription(All)  Subscription(Operator)  Subscription(Day)    │
//! │        recv() / stream    filters on operator_id  filters on day       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after the change they describe is durable (or,
//! for `SaleQueued`, after the sale is in the offline queue). They are
//! informational: screens re-read the session for authoritative numbers.
//!
//! A subscriber that falls more than [`EVENT_BUFFER_SIZE`] events behind
//! skips the oldest ones and keeps going.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use tambo_core::{BusinessDayKey, Money, RegisterSession};

/// Events buffered per subscriber before the oldest are dropped.
pub const EVENT_BUFFER_SIZE: usize = 256;

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    SessionOpened {
        session: RegisterSession,
    },
    SessionClosed {
        session: RegisterSession,
    },
    SaleCommitted {
        sale_id: String,
        operator_id: String,
        business_day: BusinessDayKey,
        total: Money,
        /// Session version after the sale.
        session_version: i64,
        /// `true` when the sale came out of the offline queue.
        replayed: bool,
    },
    SaleQueued {
        sale_id: String,
        operator_id: String,
        business_day: BusinessDayKey,
        total: Money,
        /// Queue length including this sale.
        pending: usize,
    },
    /// A queued sale whose register was closed (or never opened) by the time
    /// it could be replayed.
    SaleRejected {
        sale_id: String,
        operator_id: String,
        business_day: BusinessDayKey,
        reason: String,
    },
}

impl LedgerEvent {
    pub fn operator_id(&self) -> &str {
        match self {
            LedgerEvent::SessionOpened { session } | LedgerEvent::SessionClosed { session } => {
                &session.operator_id
            }
            LedgerEvent::SaleCommitted { operator_id, .. }
            | LedgerEvent::SaleQueued { operator_id, .. }
            | LedgerEvent::SaleRejected { operator_id, .. } => operator_id,
        }
    }

    pub fn business_day(&self) -> BusinessDayKey {
        match self {
            LedgerEvent::SessionOpened { session } | LedgerEvent::SessionClosed { session } => {
                session.business_day
            }
            LedgerEvent::SaleCommitted { business_day, .. }
            | LedgerEvent::SaleQueued { business_day, .. }
            | LedgerEvent::SaleRejected { business_day, .. } => *business_day,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::SessionOpened { .. } => "session_opened",
            LedgerEvent::SessionClosed { .. } => "session_closed",
            LedgerEvent::SaleCommitted { .. } => "sale_committed",
            LedgerEvent::SaleQueued { .. } => "sale_queued",
            LedgerEvent::SaleRejected { .. } => "sale_rejected",
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Which events a subscription wants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Operator(String),
    BusinessDay(BusinessDayKey),
}

impl EventFilter {
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Operator(id) => event.operator_id() == id,
            EventFilter::BusinessDay(day) => event.business_day() == *day,
        }
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Fan-out point for [`LedgerEvent`]s.
pub struct EventHub {
    tx: broadcast::Sender<LedgerEvent>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        EventHub {
            tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends to every live subscription. No subscribers is not an error.
    pub fn publish(&self, event: LedgerEvent) {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => debug!(kind, receivers, "Published ledger event"),
            Err(_) => debug!(kind, "No subscribers for ledger event"),
        }
    }

    /// Starts receiving events published from now on.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, ?filter, "New ledger subscription");
        Subscription {
            id,
            filter,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A filtered view of the event stream.
///
/// Dropping it unsubscribes too; [`Subscription::unsubscribe`] makes it
/// explicit at call sites.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    rx: broadcast::Receiver<LedgerEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Next matching event, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(id = self.id, skipped, "Ledger subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already waiting.
    pub fn try_recv(&mut self) -> Option<LedgerEvent> {
        use broadcast::error::TryRecvError;
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(id = self.id, skipped, "Ledger subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = LedgerEvent> + Send + Unpin {
        let Subscription { id, filter, rx } = self;
        BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(event) if filter.matches(&event) => Some(event),
            Ok(_) => None,
            Err(lagged) => {
                warn!(id, error = %lagged, "Ledger stream lagged, events dropped");
                None
            }
        })
    }

    pub fn unsubscribe(self) {
        debug!(id = self.id, "Ledger subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> BusinessDayKey {
        s.parse().unwrap()
    }

    fn committed(op: &str, d: &str) -> LedgerEvent {
        LedgerEvent::SaleCommitted {
            sale_id: format!("sale-{}-{}", op, d),
            operator_id: op.to_string(),
            business_day: day(d),
            total: Money::from_cents(500),
            session_version: 2,
            replayed: false,
        }
    }

    #[tokio::test]
    async fn test_filters() {
        let hub = EventHub::new();
        let mut all = hub.subscribe(EventFilter::All);
        let mut rosa = hub.subscribe(EventFilter::Operator("cajero-1".into()));
        let mut today = hub.subscribe(EventFilter::BusinessDay(day("2026-03-02")));

        hub.publish(committed("cajero-2", "2026-03-01"));
        hub.publish(committed("cajero-1", "2026-03-02"));

        assert_eq!(all.recv().await.unwrap().operator_id(), "cajero-2");
        assert_eq!(all.recv().await.unwrap().operator_id(), "cajero-1");
        assert_eq!(rosa.recv().await.unwrap().business_day(), day("2026-03-02"));
        assert_eq!(today.recv().await.unwrap().operator_id(), "cajero-1");
        assert!(rosa.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_receiver() {
        let hub = EventHub::new();
        let sub = hub.subscribe(EventFilter::All);
        assert_eq!(hub.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);

        // Publishing with nobody listening is fine.
        hub.publish(committed("cajero-1", "2026-03-01"));
    }

    #[tokio::test]
    async fn test_stream_applies_filter() {
        let hub = EventHub::new();
        let mut stream = hub
            .subscribe(EventFilter::Operator("cajero-2".into()))
            .into_stream();

        hub.publish(committed("cajero-1", "2026-03-01"));
        hub.publish(committed("cajero-2", "2026-03-01"));

        let event = stream.next().await.unwrap();
        assert_eq!(event.operator_id(), "cajero-2");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_going() {
        let hub = EventHub::with_capacity(2);
        let mut sub = hub.subscribe(EventFilter::All);
        for d in ["2026-03-01", "2026-03-02", "2026-03-03"] {
            hub.publish(committed("cajero-1", d));
        }
        assert_eq!(sub.recv().await.unwrap().business_day(), day("2026-03-02"));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(committed("cajero-1", "2026-03-01")).unwrap();
        assert_eq!(json["type"], "sale_committed");
        assert_eq!(json["business_day"], "2026-03-01");
    }

    #[tokio::test]
    async fn test_recv_ends_when_hub_dropped() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(EventFilter::All);
        drop(hub);
        assert!(sub.recv().await.is_none());
    }
}
