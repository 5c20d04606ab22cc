//! [`LedgerStore`] over the tambo-db repositories.

use async_trait::async_trait;
use tracing::debug;

use super::{CommitOutcome, LedgerStore};
use crate::error::StoreResult;
use tambo_core::{BusinessDayKey, Operator, Product, RegisterSession, SaleRecord, SessionKey};
use tambo_db::Database;

/// Catalog rows fetched for the sale screen.
const CATALOG_LIMIT: u32 = 500;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    catalog_limit: u32,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore {
            db,
            catalog_limit: CATALOG_LIMIT,
        }
    }

    pub fn with_catalog_limit(mut self, limit: u32) -> Self {
        self.catalog_limit = limit;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn get_session(&self, key: &SessionKey) -> StoreResult<Option<RegisterSession>> {
        Ok(self.db.sessions().get(key).await?)
    }

    async fn put_session(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> StoreResult<()> {
        Ok(self.db.sessions().put(session, expected_version).await?)
    }

    async fn commit_sale(
        &self,
        sale: &SaleRecord,
        session: &RegisterSession,
        expected_version: i64,
    ) -> StoreResult<CommitOutcome> {
        let result = self.db.sales().commit(sale, session, expected_version).await?;
        debug!(sale_id = %sale.id, ?result, "SQLite commit");
        Ok(result.into())
    }

    async fn get_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.db.products().list_active(self.catalog_limit).await?)
    }

    async fn get_product_by_id(&self, id: &str) -> StoreResult<Option<Product>> {
        Ok(self.db.products().get_by_id(id).await?)
    }

    async fn get_operator(&self, id: &str) -> StoreResult<Option<Operator>> {
        Ok(self.db.operators().get_by_id(id).await?)
    }

    async fn get_sale(&self, id: &str) -> StoreResult<Option<SaleRecord>> {
        Ok(self.db.sales().get_by_id(id).await?)
    }

    async fn sales_for_day(
        &self,
        operator_id: &str,
        business_day: BusinessDayKey,
    ) -> StoreResult<Vec<SaleRecord>> {
        Ok(self.db.sales().list_for_day(operator_id, business_day).await?)
    }
}
