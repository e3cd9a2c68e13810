use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Item;

/// A catalogue product; owns zero or more items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub product_name: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub modified_by: Option<String>,
    pub modified_on: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub items: Vec<Item>,
}

impl Product {
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }
}

/// Values for a product that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub product_name: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
}

impl NewProduct {
    pub fn new(product_name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            created_by: created_by.into(),
            created_on: Utc::now(),
        }
    }

    /// Materializes the product under an assigned id.
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id,
            product_name: self.product_name,
            created_by: self.created_by,
            created_on: self.created_on,
            modified_by: None,
            modified_on: None,
            items: Vec::new(),
        }
    }
}

/// Changes applied by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductChanges {
    pub product_name: String,
    pub modified_by: String,
    pub modified_on: DateTime<Utc>,
}

impl ProductChanges {
    pub fn new(product_name: impl Into<String>, modified_by: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            modified_by: modified_by.into(),
            modified_on: Utc::now(),
        }
    }

    pub fn apply(&self, product: &mut Product) {
        product.product_name = self.product_name.clone();
        product.modified_by = Some(self.modified_by.clone());
        product.modified_on = Some(self.modified_on);
    }
}
