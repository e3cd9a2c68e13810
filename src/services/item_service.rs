use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Item;
use crate::observability::get_metrics;
use crate::repositories::{ItemRepository, ProductRepository};
use crate::services::product_service::product_not_found;

/// Service for the items of a product.
pub struct ItemService {
    products: Arc<dyn ProductRepository>,
    items: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(products: Arc<dyn ProductRepository>, items: Arc<dyn ItemRepository>) -> Self {
        Self { products, items }
    }

    /// Adds an item to an existing product and returns the item id.
    pub async fn create(&self, product_id: i64, quantity: i32) -> Result<i64> {
        self.ensure_product(product_id).await?;

        let item = self.items.add(product_id, quantity).await?;
        get_metrics().record_resource_created("item");
        tracing::info!(product_id, item_id = item.id, quantity, "Item created");
        Ok(item.id)
    }

    pub async fn list(&self, product_id: i64) -> Result<Vec<Item>> {
        self.ensure_product(product_id).await?;
        self.items.list_by_product(product_id).await
    }

    pub async fn find(&self, product_id: i64, item_id: i64) -> Result<Item> {
        self.items.get(product_id, item_id).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "Item with id '{}' not found for product '{}'",
                item_id, product_id
            ))
        })
    }

    /// Deleting an absent item is not an error.
    pub async fn delete(&self, product_id: i64, item_id: i64) -> Result<()> {
        self.items.delete(product_id, item_id).await?;
        Ok(())
    }

    async fn ensure_product(&self, product_id: i64) -> Result<()> {
        if self.products.exists(product_id).await? {
            Ok(())
        } else {
            Err(product_not_found(product_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MockItemRepository, MockProductRepository};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_create_for_missing_product() {
        let mut products = MockProductRepository::new();
        products.expect_exists().with(eq(3)).returning(|_| Ok(false));
        let mut items = MockItemRepository::new();
        items.expect_add().never();

        let service = ItemService::new(Arc::new(products), Arc::new(items));
        assert!(matches!(
            service.create(3, 5).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_returns_item_id() {
        let mut products = MockProductRepository::new();
        products.expect_exists().returning(|_| Ok(true));
        let mut items = MockItemRepository::new();
        items
            .expect_add()
            .with(eq(1), eq(5))
            .times(1)
            .returning(|product_id, quantity| {
                Ok(Item {
                    id: 11,
                    product_id,
                    quantity,
                })
            });

        let service = ItemService::new(Arc::new(products), Arc::new(items));
        assert_eq!(service.create(1, 5).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_find_missing_item() {
        let products = MockProductRepository::new();
        let mut items = MockItemRepository::new();
        items.expect_get().returning(|_, _| Ok(None));

        let service = ItemService::new(Arc::new(products), Arc::new(items));
        assert!(matches!(
            service.find(1, 2).await,
            Err(AppError::NotFound(_))
        ));
    }
}
