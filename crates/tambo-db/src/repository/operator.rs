//! # Operator Repository
//!
//! Cashiers and admins. The ledger reads an operator's display name to print
//! it on tickets as the seller.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tambo_core::validation::validate_operator_id;
use tambo_core::Operator;

#[derive(Debug, Clone)]
pub struct OperatorRepository {
    pool: SqlitePool,
}

impl OperatorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OperatorRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Operator>> {
        let operator = sqlx::query_as::<_, Operator>(
            "SELECT id, display_name, role, is_active FROM operators WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(operator)
    }

    /// Inserts an operator, or updates name, role and status if the id
    /// already exists.
    pub async fn upsert(&self, operator: &Operator) -> DbResult<()> {
        validate_operator_id(&operator.id)?;

        debug!(id = %operator.id, role = operator.role.as_str(), "Upserting operator");

        sqlx::query(
            r#"
            INSERT INTO operators (id, display_name, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role,
                is_active = excluded.is_active
            "#,
        )
        .bind(&operator.id)
        .bind(&operator.display_name)
        .bind(operator.role)
        .bind(operator.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
