//! # Product Repository
//!
//! The catalog the cashier taps on. The ledger only reads it; the seed
//! binary fills it.
//!
//! Inactive products stay in the table for old sales and simply stop
//! appearing in `list_active`.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tambo_core::validation::{validate_price_cents, validate_product_name};
use tambo_core::Product;

const PRODUCT_COLUMNS: &str =
    "id, name, price_cents, category, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Active products ordered by category, then name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        debug!(limit, "Listing active products");

        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 \
             ORDER BY COALESCE(category, ''), name LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product_name(&product.name)?;
        validate_price_cents(product.price_cents)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, category, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.category)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
