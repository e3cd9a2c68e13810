use crate::error::{AppError, Result};
use crate::models::{Item, NewProduct, Product, ProductChanges};
use crate::repositories::{page_offset, ProductRepository};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

/// PostgreSQL-backed product repository.
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, product_ids: &[i64]) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, product_id, quantity
            FROM items
            WHERE product_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(items)
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, product_name, created_by, created_on, modified_by, modified_on
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        match product {
            Some(product) => {
                let items = self.load_items(&[product.id]).await?;
                Ok(Some(product.with_items(items)))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.0)
    }

    async fn add(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_name, created_by, created_on)
            VALUES ($1, $2, $3)
            RETURNING id, product_name, created_by, created_on, modified_by, modified_on
            "#,
        )
        .bind(&product.product_name)
        .bind(&product.created_by)
        .bind(product.created_on)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn update(&self, id: i64, changes: &ProductChanges) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET product_name = $2, modified_by = $3, modified_on = $4
            WHERE id = $1
            RETURNING id, product_name, created_by, created_on, modified_by, modified_on
            "#,
        )
        .bind(id)
        .bind(&changes.product_name)
        .bind(&changes.modified_by)
        .bind(changes.modified_on)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_paged(&self, page: i64, page_size: i64) -> Result<(Vec<Product>, i64)> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, product_name, created_by, created_on, modified_by, modified_on
            FROM products
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page_size)
        .bind(page_offset(page, page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let mut by_product: HashMap<i64, Vec<Item>> = HashMap::new();
        for item in self.load_items(&ids).await? {
            by_product.entry(item.product_id).or_default().push(item);
        }

        let products = products
            .into_iter()
            .map(|product| {
                let items = by_product.remove(&product.id).unwrap_or_default();
                product.with_items(items)
            })
            .collect();

        Ok((products, total.0))
    }
}
