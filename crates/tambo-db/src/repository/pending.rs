//! # Pending Sale Journal
//!
//! When the ledger cannot reach its store it still completes the sale on the
//! terminal and queues it. With journaling on, every queued sale is also
//! written here so a restart does not lose it.
//!
//! ```text
//!   enqueue ──► pending ──replay ok──────────► applied
//!                  │
//!                  ├──session missing/closed──► rejected (never re-opened)
//!                  │
//!                  └──store still down──────► pending, attempts += 1
//! ```
//!
//! Rows are keyed by sale id, so enqueueing the same sale twice is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tambo_core::QueuedSale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Applied,
    Rejected,
}

/// A journaled sale with its replay bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSale {
    pub queued: QueuedSale,
    pub status: PendingStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct PendingRow {
    payload: String,
    status: PendingStatus,
    attempts: i64,
    last_error: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<PendingRow> for PendingSale {
    type Error = DbError;

    fn try_from(row: PendingRow) -> DbResult<Self> {
        let mut queued: QueuedSale = serde_json::from_str(&row.payload)?;
        queued.attempts = row.attempts;
        Ok(PendingSale {
            queued,
            status: row.status,
            attempts: row.attempts,
            last_error: row.last_error,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PendingSaleRepository {
    pool: SqlitePool,
}

impl PendingSaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PendingSaleRepository { pool }
    }

    /// Journals a queued sale. Returns `false` if it was already there.
    pub async fn enqueue(&self, queued: &QueuedSale) -> DbResult<bool> {
        let payload = serde_json::to_string(queued)?;

        debug!(sale_id = %queued.sale.id, "Journaling queued sale");

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO pending_sales (
                sale_id, operator_id, business_day, payload, status, attempts, queued_at
            ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)
            "#,
        )
        .bind(&queued.sale.id)
        .bind(&queued.sale.operator_id)
        .bind(queued.sale.business_day.to_string())
        .bind(payload)
        .bind(queued.attempts)
        .bind(queued.queued_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sales still waiting, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<PendingSale>> {
        let rows = sqlx::query_as::<_, PendingRow>(
            r#"
            SELECT payload, status, attempts, last_error, resolved_at
            FROM pending_sales
            WHERE status = 'pending'
            ORDER BY queued_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingSale::try_from).collect()
    }

    pub async fn get(&self, sale_id: &str) -> DbResult<Option<PendingSale>> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT payload, status, attempts, last_error, resolved_at \
             FROM pending_sales WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingSale::try_from).transpose()
    }

    pub async fn mark_applied(&self, sale_id: &str) -> DbResult<()> {
        self.resolve(sale_id, PendingStatus::Applied, None).await
    }

    pub async fn mark_rejected(&self, sale_id: &str, reason: &str) -> DbResult<()> {
        self.resolve(sale_id, PendingStatus::Rejected, Some(reason)).await
    }

    async fn resolve(
        &self,
        sale_id: &str,
        status: PendingStatus,
        reason: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pending_sales SET
                status = ?2,
                last_error = COALESCE(?3, last_error),
                attempts = attempts + 1,
                resolved_at = ?4
            WHERE sale_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(sale_id)
        .bind(status)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PendingSale (pending)", sale_id));
        }
        Ok(())
    }

    /// Records a failed replay attempt; the sale stays pending.
    pub async fn record_attempt(&self, sale_id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE pending_sales SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE sale_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(sale_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_sales WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Deletes resolved rows older than `before`; returns how many went.
    pub async fn purge_resolved(&self, before: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM pending_sales WHERE status != 'pending' AND resolved_at < ?1",
        )
        .bind(before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
