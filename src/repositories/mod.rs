pub mod item_repository;
pub mod memory;
pub mod product_repository;

pub use item_repository::PgItemRepository;
pub use memory::InMemoryInventory;
pub use product_repository::PgProductRepository;

use crate::error::Result;
use crate::models::{Item, NewProduct, Product, ProductChanges};
use async_trait::async_trait;

/// Rows skipped before `page`; saturates instead of overflowing.
pub(crate) fn page_offset(page: i64, page_size: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(page_size.max(0))
}

/// Persistence for products. Loaded products carry their items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    async fn exists(&self, id: i64) -> Result<bool>;

    async fn add(&self, product: NewProduct) -> Result<Product>;

    /// Returns `None` when no product has this id.
    async fn update(&self, id: i64, changes: &ProductChanges) -> Result<Option<Product>>;

    /// Returns whether a product was removed. Its items go with it.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Page numbers start at 1. Returns the page and the total product count.
    async fn get_paged(&self, page: i64, page_size: i64) -> Result<(Vec<Product>, i64)>;
}

/// Persistence for items, always scoped to their product.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<Item>>;

    async fn get(&self, product_id: i64, item_id: i64) -> Result<Option<Item>>;

    async fn add(&self, product_id: i64, quantity: i32) -> Result<Item>;

    async fn delete(&self, product_id: i64, item_id: i64) -> Result<bool>;
}
