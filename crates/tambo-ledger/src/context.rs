//! # Ledger Context
//!
//! Everything the service needs, built once by the process entry point and
//! passed in explicitly. There are no globals.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ LedgerContext                                                │
//! │   store     Arc<dyn LedgerStore>   SqliteStore / MemoryStore │
//! │   clock     Arc<dyn Clock>         SystemClock / ManualClock │
//! │   config    Arc<LedgerConfig>                                │
//! │   resolver  BusinessDayResolver    from [business_day]       │
//! │   events    Arc<EventHub>                                    │
//! │   queue     Arc<OfflineQueue>      journaled when a DB is set│
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::events::EventHub;
use crate::offline::OfflineQueue;
use crate::store::{LedgerStore, SqliteStore};
use tambo_core::BusinessDayResolver;
use tambo_db::{Database, DbConfig};

#[derive(Clone)]
pub struct LedgerContext {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: Arc<LedgerConfig>,
    resolver: BusinessDayResolver,
    events: Arc<EventHub>,
    queue: Arc<OfflineQueue>,
}

impl LedgerContext {
    pub fn builder(config: LedgerConfig) -> LedgerContextBuilder {
        LedgerContextBuilder::new(config)
    }

    /// Opens the configured SQLite database and builds a context on it.
    ///
    /// Journaled sales from a previous run are loaded back into the queue.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        let path = config
            .database_path()
            .ok_or_else(|| LedgerError::Config("No database path available".into()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::new(DbConfig::new(&path)).await?;
        let journal = config.ledger.journal_offline_sales;
        let batch = config.ledger.replay_batch_size;

        let mut builder = LedgerContext::builder(config)
            .with_store(Arc::new(SqliteStore::new(db.clone())));
        if journal {
            builder = builder.with_journal(db);
        }
        let ctx = builder.build()?;

        ctx.queue.restore(batch).await?;
        info!(path = %path.display(), "Ledger context ready");
        Ok(ctx)
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &BusinessDayResolver {
        &self.resolver
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`LedgerContext`].
pub struct LedgerContextBuilder {
    config: LedgerConfig,
    store: Option<Arc<dyn LedgerStore>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<Arc<EventHub>>,
    journal: Option<Database>,
}

impl LedgerContextBuilder {
    pub fn new(config: LedgerConfig) -> Self {
        LedgerContextBuilder {
            config,
            store: None,
            clock: None,
            events: None,
            journal: None,
        }
    }

    /// Sets the persistence collaborator (required).
    pub fn with_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Shares an event hub with other components.
    pub fn with_events(mut self, events: Arc<EventHub>) -> Self {
        self.events = Some(events);
        self
    }

    /// Journals queued sales in this (local) database.
    pub fn with_journal(mut self, db: Database) -> Self {
        self.journal = Some(db);
        self
    }

    pub fn build(self) -> LedgerResult<LedgerContext> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| LedgerError::Config("LedgerStore required".into()))?;
        let resolver = self.config.resolver()?;
        let queue = match self.journal {
            Some(db) => OfflineQueue::with_journal(db.pending_sales()),
            None => OfflineQueue::new(),
        };

        Ok(LedgerContext {
            store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: Arc::new(self.config),
            resolver,
            events: self.events.unwrap_or_default(),
            queue: Arc::new(queue),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_store_is_required() {
        let result = LedgerContext::builder(LedgerConfig::default()).build();
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = LedgerConfig::default();
        config.business_day.utc_offset = "+25:00".into();
        let result = LedgerContext::builder(config)
            .with_store(Arc::new(MemoryStore::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let ctx = LedgerContext::builder(LedgerConfig::default())
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(*ctx.resolver(), BusinessDayResolver::peru());
        assert!(!ctx.queue().is_journaled());
        assert_eq!(ctx.events().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_open_with_file_database() {
        let dir = std::env::temp_dir().join(format!("tambo-ctx-{}", uuid::Uuid::new_v4()));
        let mut config = LedgerConfig::default();
        config.database.path = Some(dir.join("tambo.db"));

        let ctx = LedgerContext::open(config).await.unwrap();
        assert!(ctx.queue().is_journaled());
        assert!(ctx.store().get_products().await.unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
