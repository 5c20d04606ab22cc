//! # Register Session Repository
//!
//! One row per `(operator_id, business_day)`.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read  ──► session v3                                                   │
//! │  core  ──► successor v4 (apply_sale / close)                            │
//! │  write ──► UPDATE ... SET version = 4 WHERE key = ? AND version = 3     │
//! │                │                                                        │
//! │                ├── 1 row  → done                                        │
//! │                └── 0 rows → row missing: NotFound                       │
//! │                             row moved on: Conflict (caller re-reads)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The row is never rewritten blindly, so two terminals sharing a database
//! cannot lose each other's sales.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tambo_core::{BusinessDayKey, Money, RegisterSession, SessionKey};

const SESSION_COLUMNS: &str = "operator_id, business_day, is_open, opened_at, closed_at, \
     initial_amount_cents, current_amount_cents, total_sales_cents, \
     cash_sales_cents, transfer_sales_cents, sale_count, version";

#[derive(Debug, FromRow)]
struct SessionRow {
    operator_id: String,
    business_day: String,
    is_open: bool,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    initial_amount_cents: i64,
    current_amount_cents: i64,
    total_sales_cents: i64,
    cash_sales_cents: i64,
    transfer_sales_cents: i64,
    sale_count: i64,
    version: i64,
}

impl TryFrom<SessionRow> for RegisterSession {
    type Error = DbError;

    fn try_from(row: SessionRow) -> DbResult<Self> {
        let business_day = row
            .business_day
            .parse::<BusinessDayKey>()
            .map_err(|e| DbError::corrupt("register_sessions", e))?;

        Ok(RegisterSession {
            operator_id: row.operator_id,
            business_day,
            is_open: row.is_open,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            initial_amount: Money::from_cents(row.initial_amount_cents),
            current_amount: Money::from_cents(row.current_amount_cents),
            total_sales: Money::from_cents(row.total_sales_cents),
            cash_sales: Money::from_cents(row.cash_sales_cents),
            transfer_sales: Money::from_cents(row.transfer_sales_cents),
            sale_count: row.sale_count,
            version: row.version,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    pub async fn get(&self, key: &SessionKey) -> DbResult<Option<RegisterSession>> {
        let sql = format!(
            "SELECT {} FROM register_sessions WHERE operator_id = ?1 AND business_day = ?2",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(&key.operator_id)
            .bind(key.business_day.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegisterSession::try_from).transpose()
    }

    /// Creates the row (`expected_version = None`) or replaces it if it is
    /// still at `expected_version`.
    pub async fn put(
        &self,
        session: &RegisterSession,
        expected_version: Option<i64>,
    ) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_session(&mut *conn, session, expected_version).await
    }
}

/// Shared by [`SessionRepository::put`] and the sale commit transaction.
pub(crate) async fn write_session(
    conn: &mut SqliteConnection,
    session: &RegisterSession,
    expected_version: Option<i64>,
) -> DbResult<()> {
    let key = session.key();
    let day = key.business_day.to_string();

    let Some(expected) = expected_version else {
        debug!(session = %key, "Inserting register session");
        return match sqlx::query(
            r#"
            INSERT INTO register_sessions (
                operator_id, business_day, is_open, opened_at, closed_at,
                initial_amount_cents, current_amount_cents, total_sales_cents,
                cash_sales_cents, transfer_sales_cents, sale_count, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&session.operator_id)
        .bind(&day)
        .bind(session.is_open)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .bind(session.initial_amount.cents())
        .bind(session.current_amount.cents())
        .bind(session.total_sales.cents())
        .bind(session.cash_sales.cents())
        .bind(session.transfer_sales.cents())
        .bind(session.sale_count)
        .bind(session.version)
        .execute(&mut *conn)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => match DbError::from(e) {
                // Someone opened the same key first.
                DbError::UniqueViolation { .. } => Err(DbError::conflict(
                    "RegisterSession",
                    key.to_string(),
                    0,
                )),
                other => Err(other),
            },
        };
    };

    debug!(session = %key, expected, version = session.version, "Updating register session");

    let result = sqlx::query(
        r#"
        UPDATE register_sessions SET
            is_open = ?3,
            closed_at = ?4,
            current_amount_cents = ?5,
            total_sales_cents = ?6,
            cash_sales_cents = ?7,
            transfer_sales_cents = ?8,
            sale_count = ?9,
            version = ?10
        WHERE operator_id = ?1 AND business_day = ?2 AND version = ?11
        "#,
    )
    .bind(&session.operator_id)
    .bind(&day)
    .bind(session.is_open)
    .bind(session.closed_at)
    .bind(session.current_amount.cents())
    .bind(session.total_sales.cents())
    .bind(session.cash_sales.cents())
    .bind(session.transfer_sales.cents())
    .bind(session.sale_count)
    .bind(session.version)
    .bind(expected)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM register_sessions WHERE operator_id = ?1 AND business_day = ?2",
    )
    .bind(&session.operator_id)
    .bind(&day)
    .fetch_one(&mut *conn)
    .await?;

    if exists == 0 {
        Err(DbError::not_found("RegisterSession", key.to_string()))
    } else {
        Err(DbError::conflict("RegisterSession", key.to_string(), expected))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;
    use tambo_core::{open_session, BusinessDayResolver, LedgerDelta};

    fn fresh() -> RegisterSession {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        open_session(None, "cajero-1", now, &BusinessDayResolver::peru()).session
    }

    fn delta(cash: i64, transfer: i64) -> LedgerDelta {
        LedgerDelta {
            total_delta: Money::from_cents(cash + transfer),
            cash_delta: Money::from_cents(cash),
            transfer_delta: Money::from_cents(transfer),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = fresh();
        db.sessions().put(&session, None).await.unwrap();

        let loaded = db.sessions().get(&session.key()).await.unwrap();
        assert_eq!(loaded, Some(session.clone()));
    }

    #[tokio::test]
    async fn test_second_insert_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = fresh();
        db.sessions().put(&session, None).await.unwrap();
        assert!(matches!(
            db.sessions().put(&session, None).await,
            Err(DbError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_version_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let v1 = fresh();
        db.sessions().put(&v1, None).await.unwrap();

        let v2 = v1.apply_sale(&delta(1000, 500)).unwrap();
        db.sessions().put(&v2, Some(v1.version)).await.unwrap();

        // A stale writer still holding v1.
        let stale = v1.apply_sale(&delta(200, 0)).unwrap();
        assert!(matches!(
            db.sessions().put(&stale, Some(v1.version)).await,
            Err(DbError::Conflict { expected, .. }) if expected == v1.version
        ));

        let loaded = db.sessions().get(&v1.key()).await.unwrap().unwrap();
        assert_eq!(loaded, v2);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let v1 = fresh();
        let v2 = v1.apply_sale(&delta(100, 0)).unwrap();
        assert!(matches!(
            db.sessions().put(&v2, Some(v1.version)).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_session_round_trips() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let v1 = fresh();
        db.sessions().put(&v1, None).await.unwrap();

        let closed = v1
            .close(Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).unwrap())
            .unwrap();
        db.sessions().put(&closed, Some(v1.version)).await.unwrap();

        let loaded = db.sessions().get(&v1.key()).await.unwrap().unwrap();
        assert!(!loaded.is_open);
        assert_eq!(loaded.closed_at, closed.closed_at);
        assert_eq!(loaded.version, v1.version + 1);
    }
}
