//! Sales made while the store is unreachable, and their replay.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tambo_core::{prepare_sale, BusinessDayResolver, CartLine, Money, PaymentMethod, QueuedSale};
use tambo_ledger::{
    Clock, EventFilter, LedgerError, LedgerEvent, LedgerStore, ReplayReport, ReplayWorker,
    SaleStatus,
};

fn cart() -> Vec<CartLine> {
    vec![line("p-1", 800, 2, PaymentMethod::Cash)]
}

#[tokio::test]
async fn test_offline_sale_is_queued_then_replayed() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    let mut events = h.service.subscribe(EventFilter::All);

    h.store.set_online(false);
    let processed = h.service.process_sale(&cart(), CASHIER).await.unwrap();

    assert_eq!(processed.status, SaleStatus::Queued);
    assert!(processed.session.is_none());
    assert_eq!(processed.tickets.len(), 2);
    match events.try_recv() {
        Some(LedgerEvent::SaleQueued { pending, total, .. }) => {
            assert_eq!(pending, 1);
            assert_eq!(total, Money::from_cents(1600));
        }
        other => panic!("expected SaleQueued, got {other:?}"),
    }
    assert_eq!(h.service.pending_sales().await.len(), 1);

    h.store.set_online(true);
    let report = h.service.replay_pending().await.unwrap();

    assert_eq!(report.applied, 1);
    assert!(report.is_drained());
    assert!(report.stopped.is_none());
    assert_eq!(h.store.sale_count().await, 1);

    let session = h.service.get_current_session(CASHIER).await.unwrap().unwrap();
    assert_eq!(session.version, 2);
    assert_eq!(session.cash_sales, Money::from_cents(1600));

    match events.try_recv() {
        Some(LedgerEvent::SaleCommitted {
            sale_id, replayed, ..
        }) => {
            assert_eq!(sale_id, processed.sale.id);
            assert!(replayed);
        }
        other => panic!("expected SaleCommitted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_replay_keeps_queue_order() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    h.store.set_online(false);

    let mut ids = Vec::new();
    for qty in 1..=3 {
        let cart = [line("p-2", 450, qty, PaymentMethod::Transfer)];
        ids.push(h.service.process_sale(&cart, CASHIER).await.unwrap().sale.id);
        h.tick();
    }

    h.store.set_online(true);
    let report = h.service.replay_pending().await.unwrap();
    assert_eq!(report.applied, 3);

    let stored = h
        .store
        .sales_for_day(CASHIER, day("2026-03-01"))
        .await
        .unwrap();
    let stored_ids: Vec<_> = stored.into_iter().map(|s| s.id).collect();
    assert_eq!(stored_ids, ids);

    let session = h
        .service
        .reconcile_day(CASHIER, day("2026-03-01"))
        .await
        .unwrap();
    assert_eq!(session.sale_count, 3);
    assert_eq!(session.version, 4);
    assert_eq!(session.current_amount, Money::zero());
}

#[tokio::test]
async fn test_replay_stops_while_store_is_down() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    h.store.set_online(false);

    h.service.process_sale(&cart(), CASHIER).await.unwrap();
    h.tick();
    h.service.process_sale(&cart(), CASHIER).await.unwrap();

    let report = h.service.replay_pending().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.remaining, 2);
    assert!(report.stopped.is_some());

    let pending = h.service.pending_sales().await;
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[1].attempts, 0);
}

#[tokio::test]
async fn test_register_closed_elsewhere_rejects_queued_sale() {
    let h = Harness::new().await;
    let opened = h.service.open_register(CASHIER).await.unwrap();

    h.store.set_online(false);
    let queued = h.service.process_sale(&cart(), CASHIER).await.unwrap();
    assert_eq!(queued.status, SaleStatus::Queued);

    // Another terminal closes the register while this one is offline.
    h.store.set_online(true);
    let closed = opened.close(h.clock.now()).unwrap();
    h.store.put_session(&closed, Some(opened.version)).await.unwrap();

    let mut events = h.service.subscribe(EventFilter::Operator(CASHIER.into()));
    let report = h.service.replay_pending().await.unwrap();

    assert_eq!(
        report,
        ReplayReport {
            rejected: 1,
            ..ReplayReport::default()
        }
    );
    assert_eq!(h.store.sale_count().await, 0);
    match events.try_recv() {
        Some(LedgerEvent::SaleRejected { sale_id, .. }) => assert_eq!(sale_id, queued.sale.id),
        other => panic!("expected SaleRejected, got {other:?}"),
    }

    // Not reopened behind the operator's back.
    let session = h.store.get_session(&opened.key()).await.unwrap().unwrap();
    assert!(!session.is_open);
}

#[tokio::test]
async fn test_close_records_queued_sales_first() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();

    h.store.set_online(false);
    let queued = h.service.process_sale(&cart(), CASHIER).await.unwrap();
    assert_eq!(queued.status, SaleStatus::Queued);
    h.store.set_online(true);

    let closed = h.service.close_register(CASHIER).await.unwrap();

    assert!(!closed.is_open);
    assert_eq!(closed.sale_count, 1);
    assert_eq!(closed.cash_sales, Money::from_cents(1600));
    assert_eq!(closed.current_amount, Money::from_cents(1600));
    assert_eq!(closed.version, 3);
    assert!(h.service.pending_sales().await.is_empty());
    assert!(h.store.get_sale(&queued.sale.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_close_is_refused_while_queued_sales_cannot_be_recorded() {
    let h = Harness::new().await;
    let opened = h.service.open_register(CASHIER).await.unwrap();

    h.store.set_online(false);
    h.service.process_sale(&cart(), CASHIER).await.unwrap();

    let err = h.service.close_register(CASHIER).await.unwrap_err();
    assert!(matches!(err, LedgerError::PendingSales { pending: 1, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.service.pending_sales().await.len(), 1);

    h.store.set_online(true);
    let session = h.store.get_session(&opened.key()).await.unwrap().unwrap();
    assert!(session.is_open);

    let closed = h.service.close_register(CASHIER).await.unwrap();
    assert_eq!(closed.cash_sales, Money::from_cents(1600));
}

#[tokio::test]
async fn test_known_closed_register_refuses_offline_sale() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    h.service.close_register(CASHIER).await.unwrap();

    h.store.set_online(false);
    let err = h.service.process_sale(&cart(), CASHIER).await.unwrap_err();

    assert!(matches!(err, LedgerError::RegisterClosed { .. }));
    assert!(h.service.pending_sales().await.is_empty());
}

#[tokio::test]
async fn test_unknown_register_offline_is_queued_then_rejected() {
    let h = Harness::new().await;
    h.store.set_online(false);

    let processed = h.service.process_sale(&cart(), CASHIER).await.unwrap();
    assert_eq!(processed.status, SaleStatus::Queued);
    // Seller name could not be looked up.
    assert_eq!(processed.tickets[0].seller_name, CASHIER);

    h.store.set_online(true);
    let report = h.service.replay_pending().await.unwrap();
    assert_eq!(report.rejected, 1);
    assert!(report.is_drained());
}

#[tokio::test]
async fn test_already_stored_sale_counts_as_duplicate() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    let processed = h.service.process_sale(&cart(), CASHIER).await.unwrap();

    // A commit whose answer never arrived, queued anyway.
    h.service
        .context()
        .queue()
        .push(QueuedSale {
            delta: processed.sale.delta(),
            sale: processed.sale.clone(),
            queued_at: h.clock.now(),
            attempts: 0,
        })
        .await;

    let report = h.service.replay_pending().await.unwrap();
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.applied, 0);
    assert_eq!(h.store.sale_count().await, 1);

    let session = h.service.get_current_session(CASHIER).await.unwrap().unwrap();
    assert_eq!(session.sale_count, 1);
}

#[tokio::test]
async fn test_tampered_queue_entry_is_rejected() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();

    let (mut sale, delta) =
        prepare_sale(&cart(), CASHIER, h.clock.now(), &BusinessDayResolver::peru()).unwrap();
    sale.total = Money::from_cents(1);
    h.service
        .context()
        .queue()
        .push(QueuedSale {
            sale,
            delta,
            queued_at: h.clock.now(),
            attempts: 0,
        })
        .await;

    let report = h.service.replay_pending().await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(h.store.sale_count().await, 0);
}

#[tokio::test]
async fn test_current_session_falls_back_to_last_known() {
    let h = Harness::new().await;
    let opened = h.service.open_register(CASHIER).await.unwrap();

    h.store.set_online(false);
    h.clock.advance(Duration::from_secs(3600));
    let session = h.service.get_current_session(CASHIER).await.unwrap();
    assert_eq!(session, Some(opened));
}

#[tokio::test(start_paused = true)]
async fn test_replay_worker_drains_queue_and_shuts_down() {
    let h = Harness::new().await;
    h.service.open_register(CASHIER).await.unwrap();
    h.store.set_online(false);
    let processed = h.service.process_sale(&cart(), CASHIER).await.unwrap();
    h.store.set_online(true);

    let mut events = h.service.subscribe(EventFilter::All);
    let (worker, handle) = ReplayWorker::with_interval(Arc::clone(&h.service), Duration::from_secs(5));
    let task = tokio::spawn(worker.run());
    handle.replay_now();

    let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
        .await
        .unwrap();
    match event {
        Some(LedgerEvent::SaleCommitted {
            sale_id, replayed, ..
        }) => {
            assert_eq!(sale_id, processed.sale.id);
            assert!(replayed);
        }
        other => panic!("expected SaleCommitted, got {other:?}"),
    }

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert!(h.service.pending_sales().await.is_empty());
}
