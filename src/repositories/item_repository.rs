use crate::error::{AppError, Result};
use crate::models::Item;
use crate::repositories::ItemRepository;
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL-backed item repository.
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, product_id, quantity
            FROM items
            WHERE product_id = $1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(items)
    }

    async fn get(&self, product_id: i64, item_id: i64) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, product_id, quantity
            FROM items
            WHERE id = $1 AND product_id = $2
            "#,
        )
        .bind(item_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(item)
    }

    async fn add(&self, product_id: i64, quantity: i32) -> Result<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (product_id, quantity)
            VALUES ($1, $2)
            RETURNING id, product_id, quantity
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(item)
    }

    async fn delete(&self, product_id: i64, item_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1 AND product_id = $2")
            .bind(item_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
