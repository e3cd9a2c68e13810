use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{NewProduct, Product, ProductChanges};
use crate::observability::get_metrics;
use crate::repositories::ProductRepository;

/// Actor recorded on writes until authentication supplies one.
pub const SYSTEM_ACTOR: &str = "system";

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 200;

/// One page of products plus the total count.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub products: Vec<Product>,
}

/// Service for product management operations.
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    /// Creates a product and returns its id.
    pub async fn create(&self, product_name: &str) -> Result<i64> {
        let product = self
            .products
            .add(NewProduct::new(product_name, SYSTEM_ACTOR))
            .await?;

        get_metrics().record_resource_created("product");
        tracing::info!(product_id = product.id, "Product created");
        Ok(product.id)
    }

    /// Finds a product with its items.
    pub async fn find_by_id(&self, id: i64) -> Result<Product> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or_else(|| product_not_found(id))
    }

    /// Lists products. Out-of-range paging arguments are clamped.
    pub async fn list(&self, page: Option<i64>, page_size: Option<i64>) -> Result<ProductPage> {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let (products, total) = self.products.get_paged(page, page_size).await?;
        Ok(ProductPage {
            page,
            page_size,
            total,
            products,
        })
    }

    pub async fn rename(&self, id: i64, product_name: &str) -> Result<()> {
        let changes = ProductChanges::new(product_name, SYSTEM_ACTOR);
        match self.products.update(id, &changes).await? {
            Some(_) => Ok(()),
            None => Err(product_not_found(id)),
        }
    }

    /// Deleting an absent product is not an error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        if self.products.delete(id).await? {
            tracing::info!(product_id = id, "Product deleted");
        }
        Ok(())
    }
}

pub(crate) fn product_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Product with id '{}' not found", id))
}
