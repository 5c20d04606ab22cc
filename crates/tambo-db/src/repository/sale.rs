//! # Sale Repository
//!
//! Sales are append-only. The only write is [`SaleRepository::commit`],
//! which stores a sale together with the register session it moved.
//!
//! ## Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. SELECT 1 FROM sales WHERE id = ?        ── found → Duplicate        │
//! │  2. INSERT INTO sales (...)                                             │
//! │  3. INSERT INTO sale_lines (...) × n                                    │
//! │  4. UPDATE register_sessions ... WHERE version = expected               │
//! │        └── 0 rows → Conflict, everything above rolls back               │
//! │                                                                         │
//! │  COMMIT ← the sale and the drawer move together or not at all           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A replayed sale (same id) is reported as `Duplicate` and changes nothing,
//! so the offline queue can retry safely.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::session::write_session;
use tambo_core::{
    BusinessDayKey, Money, PaymentBreakdown, PaymentMethod, PromotionSummary, RegisterSession,
    SaleLine, SaleRecord,
};

/// What [`SaleRepository::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed,
    /// A sale with this id was already stored; nothing was written.
    Duplicate,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    operator_id: String,
    business_day: String,
    total_cents: i64,
    cash_cents: i64,
    transfer_cents: i64,
    paid_item_count: i64,
    free_item_count: i64,
    total_ticket_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    sale_id: String,
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    payment_method: PaymentMethod,
    line_total_cents: i64,
}

impl From<LineRow> for SaleLine {
    fn from(row: LineRow) -> Self {
        SaleLine {
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            unit_price: Money::from_cents(row.unit_price_cents),
            quantity: row.quantity,
            payment_method: row.payment_method,
            line_total: Money::from_cents(row.line_total_cents),
        }
    }
}

impl SaleRow {
    fn into_record(self, lines: Vec<SaleLine>) -> DbResult<SaleRecord> {
        let business_day = self
            .business_day
            .parse::<BusinessDayKey>()
            .map_err(|e| DbError::corrupt("sales", e))?;

        Ok(SaleRecord {
            id: self.id,
            lines,
            total: Money::from_cents(self.total_cents),
            by_method: PaymentBreakdown {
                cash: Money::from_cents(self.cash_cents),
                transfer: Money::from_cents(self.transfer_cents),
            },
            operator_id: self.operator_id,
            business_day,
            created_at: self.created_at,
            promotion: PromotionSummary {
                paid_item_count: self.paid_item_count,
                free_item_count: self.free_item_count,
                total_ticket_count: self.total_ticket_count,
            },
        })
    }
}

const SALE_COLUMNS: &str = "id, operator_id, business_day, total_cents, cash_cents, \
     transfer_cents, paid_item_count, free_item_count, total_ticket_count, created_at";

const LINE_COLUMNS: &str = "l.sale_id, l.product_id, l.name_snapshot, l.unit_price_cents, \
     l.quantity, l.payment_method, l.line_total_cents";

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Stores `sale` and moves its session from `expected_version` to
    /// `session` atomically.
    ///
    /// `session` must be the successor computed by `apply_sale`; this layer
    /// does not re-check the arithmetic, only the version.
    pub async fn commit(
        &self,
        sale: &SaleRecord,
        session: &RegisterSession,
        expected_version: i64,
    ) -> DbResult<CommitResult> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE id = ?1")
            .bind(&sale.id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            debug!(sale_id = %sale.id, "Sale already stored");
            return Ok(CommitResult::Duplicate);
        }

        let day = sale.business_day.to_string();
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, operator_id, business_day,
                total_cents, cash_cents, transfer_cents,
                paid_item_count, free_item_count, total_ticket_count,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.operator_id)
        .bind(&day)
        .bind(sale.total.cents())
        .bind(sale.by_method.cash.cents())
        .bind(sale.by_method.transfer.cents())
        .bind(sale.promotion.paid_item_count)
        .bind(sale.promotion.free_item_count)
        .bind(sale.promotion.total_ticket_count)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in sale.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    sale_id, line_no, product_id, name_snapshot,
                    unit_price_cents, quantity, payment_method, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(line.unit_price.cents())
            .bind(line.quantity)
            .bind(line.payment_method)
            .bind(line.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        write_session(&mut *tx, session, Some(expected_version)).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            session = %session.key(),
            total = %sale.total,
            version = session.version,
            "Sale committed"
        );
        Ok(CommitResult::Committed)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleRecord>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let Some(row) = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM sale_lines l WHERE l.sale_id = ?1 ORDER BY l.line_no",
            LINE_COLUMNS
        );
        let lines = sqlx::query_as::<_, LineRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        row.into_record(lines.into_iter().map(SaleLine::from).collect())
            .map(Some)
    }

    /// Every sale of one session, in the order they were made.
    pub async fn list_for_day(
        &self,
        operator_id: &str,
        day: BusinessDayKey,
    ) -> DbResult<Vec<SaleRecord>> {
        let day = day.to_string();

        let sql = format!(
            "SELECT {} FROM sales WHERE operator_id = ?1 AND business_day = ?2 \
             ORDER BY created_at, rowid",
            SALE_COLUMNS
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(operator_id)
            .bind(&day)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM sale_lines l JOIN sales s ON s.id = l.sale_id \
             WHERE s.operator_id = ?1 AND s.business_day = ?2 \
             ORDER BY l.sale_id, l.line_no",
            LINE_COLUMNS
        );
        let line_rows = sqlx::query_as::<_, LineRow>(&sql)
            .bind(operator_id)
            .bind(&day)
            .fetch_all(&self.pool)
            .await?;

        let mut lines: HashMap<String, Vec<SaleLine>> = HashMap::new();
        for row in line_rows {
            lines.entry(row.sale_id.clone()).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let sale_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_record(sale_lines)
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
