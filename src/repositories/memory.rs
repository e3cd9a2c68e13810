//! In-memory repositories for tests and database-less local runs.

use crate::error::Result;
use crate::models::{Item, NewProduct, Product, ProductChanges};
use crate::repositories::{page_offset, ItemRepository, ProductRepository};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<i64, Product>,
    items: BTreeMap<i64, Item>,
    last_product_id: i64,
    last_item_id: i64,
}

impl Tables {
    fn items_of(&self, product_id: i64) -> Vec<Item> {
        self.items
            .values()
            .filter(|item| item.product_id == product_id)
            .cloned()
            .collect()
    }
}

/// Products and items held in process memory. Ids start at 1, like a
/// fresh identity column.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    tables: RwLock<Tables>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn product_count(&self) -> usize {
        self.tables.read().await.products.len()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.read().await.items.len()
    }
}

#[async_trait]
impl ProductRepository for InMemoryInventory {
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&id)
            .map(|product| product.clone().with_items(tables.items_of(id))))
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.tables.read().await.products.contains_key(&id))
    }

    async fn add(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.write().await;
        tables.last_product_id += 1;
        let product = product.into_product(tables.last_product_id);
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: i64, changes: &ProductChanges) -> Result<Option<Product>> {
        let mut tables = self.tables.write().await;
        Ok(tables.products.get_mut(&id).map(|product| {
            changes.apply(product);
            product.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.products.remove(&id).is_some();
        if removed {
            tables.items.retain(|_, item| item.product_id != id);
        }
        Ok(removed)
    }

    async fn get_paged(&self, page: i64, page_size: i64) -> Result<(Vec<Product>, i64)> {
        let tables = self.tables.read().await;
        let skip = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let products = tables
            .products
            .values()
            .skip(skip)
            .take(page_size.max(0) as usize)
            .map(|product| product.clone().with_items(tables.items_of(product.id)))
            .collect();

        Ok((products, tables.products.len() as i64))
    }
}

#[async_trait]
impl ItemRepository for InMemoryInventory {
    async fn list_by_product(&self, product_id: i64) -> Result<Vec<Item>> {
        Ok(self.tables.read().await.items_of(product_id))
    }

    async fn get(&self, product_id: i64, item_id: i64) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .get(&item_id)
            .filter(|item| item.product_id == product_id)
            .cloned())
    }

    async fn add(&self, product_id: i64, quantity: i32) -> Result<Item> {
        let mut tables = self.tables.write().await;
        tables.last_item_id += 1;
        let item = Item {
            id: tables.last_item_id,
            product_id,
            quantity,
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete(&self, product_id: i64, item_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.items.get(&item_id) {
            Some(item) if item.product_id == product_id => {
                tables.items.remove(&item_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
