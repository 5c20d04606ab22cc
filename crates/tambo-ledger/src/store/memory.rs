//! In-memory [`LedgerStore`].
//!
//! Used by tests and by demos without a database. All state sits behind one
//! `RwLock`, so a commit is atomic simply by holding the write guard.
//! `set_online(false)` makes every call fail with `Unavailable`, which is how
//! the offline path is exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CommitOutcome, LedgerStore};
use crate::error::{StoreError, StoreResult};
use tambo_core::{BusinessDayKey, Operator, Product, RegisterSession, SaleRecord, SessionKey};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<SessionKey, RegisterSession>,
    /// Commit order.
    sales: Vec<SaleRecord>,
    sale_ids: HashSet<String>,
    products: Vec<Product>,
    operators: HashMap<String, Operator>,
}

impl MemoryState {
    fn check_version(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> StoreResult<()> {
        let key = session.key();
        match (self.sessions.get(&key), expected_version) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(StoreError::Conflict {
                key: key.to_string(),
                expected: 0,
            }),
            (None, Some(_)) => Err(StoreError::NotFound {
                entity: "RegisterSession".to_string(),
                id: key.to_string(),
            }),
            (Some(current), Some(expected)) if current.version != expected => {
                Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                })
            }
            (Some(_), Some(_)) => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: RwLock::new(MemoryState::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_online(&self, online: bool) {
        debug!(online, "Memory store availability changed");
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub async fn add_product(&self, product: Product) {
        let mut state = self.state.write().await;
        state.products.retain(|p| p.id != product.id);
        state.products.push(product);
    }

    pub async fn add_operator(&self, operator: Operator) {
        self.state
            .write()
            .await
            .operators
            .insert(operator.id.clone(), operator);
    }

    /// Number of committed sales across all sessions.
    pub async fn sale_count(&self) -> usize {
        self.state.read().await.sales.len()
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store is offline"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_session(&self, key: &SessionKey) -> StoreResult<Option<RegisterSession>> {
        self.ensure_online()?;
        Ok(self.state.read().await.sessions.get(key).cloned())
    }

    async fn put_session(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> StoreResult<()> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        state.check_version(session, expected_version)?;
        state.sessions.insert(session.key(), session.clone());
        Ok(())
    }

    async fn commit_sale(
        &self,
        sale: &SaleRecord,
        session: &RegisterSession,
        expected_version: i64,
    ) -> StoreResult<CommitOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;

        if state.sale_ids.contains(&sale.id) {
            return Ok(CommitOutcome::Duplicate);
        }
        state.check_version(session, Some(expected_version))?;

        state.sale_ids.insert(sale.id.clone());
        state.sales.push(sale.clone());
        state.sessions.insert(session.key(), session.clone());
        Ok(CommitOutcome::Committed)
    }

    async fn get_products(&self) -> StoreResult<Vec<Product>> {
        self.ensure_online()?;
        let mut products: Vec<Product> = self
            .state
            .read()
            .await
            .products
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            let cat = |p: &Product| p.category.clone().unwrap_or_default();
            cat(a).cmp(&cat(b)).then_with(|| a.name.cmp(&b.name))
        });
        Ok(products)
    }

    async fn get_product_by_id(&self, id: &str) -> StoreResult<Option<Product>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .await
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn get_operator(&self, id: &str) -> StoreResult<Option<Operator>> {
        self.ensure_online()?;
        Ok(self.state.read().await.operators.get(id).cloned())
    }

    async fn get_sale(&self, id: &str) -> StoreResult<Option<SaleRecord>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .await
            .sales
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn sales_for_day(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> StoreResult<Vec<SaleRecord>> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .await
            .sales
            .iter()
            .filter(|s| s.operator_id == operator_id && s.business_day == business_day)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tambo_core::{
        open_session, prepare_sale, BusinessDayResolver, CartLine, Money, PaymentMethod,
    };

    fn session() -> RegisterSession {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        open_session(None, "cajero-1", now, &BusinessDayResolver::peru()).session
    }

    fn sale() -> SaleRecord {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        let cart = vec![CartLine::new(
            "p-1",
            "Tamal",
            Money::from_cents(800),
            1,
            PaymentMethod::Cash,
        )];
        prepare_sale(&cart, "cajero-1", now, &BusinessDayResolver::peru())
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_version_rules_match_sqlite() {
        let store = MemoryStore::new();
        let v1 = session();

        store.put_session(&v1, None).await.unwrap();
        assert!(matches!(
            store.put_session(&v1, None).await,
            Err(StoreError::Conflict { .. })
        ));

        let v2 = v1.apply_sale(&sale().delta()).unwrap();
        store.put_session(&v2, Some(1)).await.unwrap();
        assert!(matches!(
            store.put_session(&v2, Some(1)).await,
            Err(StoreError::Conflict { expected: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_by_sale_id() {
        let store = MemoryStore::new();
        let v1 = session();
        store.put_session(&v1, None).await.unwrap();

        let sale = sale();
        let v2 = v1.apply_sale(&sale.delta()).unwrap();
        assert_eq!(
            store.commit_sale(&sale, &v2, 1).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.commit_sale(&sale, &v2, 1).await.unwrap(),
            CommitOutcome::Duplicate
        );
        assert_eq!(store.sale_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_commit_writes_nothing() {
        let store = MemoryStore::new();
        let v1 = session();
        store.put_session(&v1, None).await.unwrap();

        let sale = sale();
        let v2 = v1.apply_sale(&sale.delta()).unwrap();
        assert!(store.commit_sale(&sale, &v2, 7).await.is_err());
        assert_eq!(store.sale_count().await, 0);
        assert_eq!(store.get_session(&v1.key()).await.unwrap(), Some(v1));
    }

    #[tokio::test]
    async fn test_offline_switch() {
        let store = MemoryStore::new();
        store.set_online(false);
        assert!(store.get_products().await.unwrap_err().is_unavailable());
        store.set_online(true);
        assert!(store.get_products().await.unwrap().is_empty());
    }
}
