use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stock line belonging to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
}
