//! Shared fixtures for the ledger integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tambo_core::{
    BusinessDayKey, CartLine, Money, Operator, OperatorRole, PaymentMethod, Product,
    RegisterSession, SaleRecord, SessionKey,
};
use tambo_ledger::{
    CommitOutcome, LedgerConfig, LedgerContext, LedgerStore, ManualClock, MemoryStore,
    RegisterService, StoreResult,
};

pub const CASHIER: &str = "cajero-1";

/// 10:00 in Lima on 2026-03-01.
pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap()
}

pub fn day(s: &str) -> BusinessDayKey {
    s.parse().unwrap()
}

pub fn product(id: &str, name: &str, cents: i64) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price_cents: cents,
        category: Some("Comidas".to_string()),
        is_active: true,
        created_at: morning(),
        updated_at: morning(),
    }
}

pub fn line(id: &str, cents: i64, quantity: i64, method: PaymentMethod) -> CartLine {
    CartLine::new(id, format!("Plato {id}"), Money::from_cents(cents), quantity, method)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<RegisterService>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    pub async fn with_config(config: LedgerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .add_operator(Operator {
                id: CASHIER.to_string(),
                display_name: "Rosa".to_string(),
                role: OperatorRole::Cashier,
                is_active: true,
            })
            .await;
        store.add_product(product("p-1", "Tamal", 800)).await;
        store.add_product(product("p-2", "Chicha morada", 450)).await;
        let clock = Arc::new(ManualClock::new(morning()));

        let ctx = LedgerContext::builder(config)
            .with_store(store.clone())
            .with_clock(clock.clone())
            .build()
            .unwrap();

        Harness {
            store,
            clock,
            service: Arc::new(RegisterService::new(ctx)),
        }
    }

    /// Moves past the default sale window so the next sale is not limited.
    pub fn tick(&self) {
        self.clock.advance(Duration::from_secs(1));
    }
}

/// Wraps a store and, on the first sale commit, bumps the session version
/// as if another terminal had written it first.
pub struct RacingStore {
    pub inner: Arc<MemoryStore>,
    raced: AtomicBool,
}

impl RacingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        RacingStore {
            inner,
            raced: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LedgerStore for RacingStore {
    async fn get_session(&self, key: &SessionKey) -> StoreResult<Option<RegisterSession>> {
        self.inner.get_session(key).await
    }

    async fn put_session(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> StoreResult<()> {
        self.inner.put_session(session, expected_version).await
    }

    async fn commit_sale(
        &self,
        sale: &SaleRecord,
        session: &RegisterSession,
        expected_version: i64,
    ) -> StoreResult<CommitOutcome> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            if let Some(current) = self.inner.get_session(&session.key()).await? {
                let mut bumped = current.clone();
                bumped.version += 1;
                self.inner.put_session(&bumped, Some(current.version)).await?;
            }
        }
        self.inner.commit_sale(sale, session, expected_version).await
    }

    async fn get_products(&self) -> StoreResult<Vec<Product>> {
        self.inner.get_products().await
    }

    async fn get_product_by_id(&self, id: &str) -> StoreResult<Option<Product>> {
        self.inner.get_product_by_id(id).await
    }

    async fn get_operator(&self, id: &str) -> StoreResult<Option<Operator>> {
        self.inner.get_operator(id).await
    }

    async fn get_sale(&self, id: &str) -> StoreResult<Option<SaleRecord>> {
        self.inner.get_sale(id).await
    }

    async fn sales_for_day(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> StoreResult<Vec<SaleRecord>> {
        self.inner.sales_for_day(operator_id, business_day).await
    }
}
