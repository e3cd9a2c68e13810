use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Item, Product};
use crate::services::ProductPage;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Item response DTO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: i64,
    pub quantity: i32,
    pub product_id: i64,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            quantity: item.quantity,
            product_id: item.product_id,
        }
    }
}

/// Product response DTO, items included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub product_name: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub modified_by: Option<String>,
    pub modified_on: Option<DateTime<Utc>>,
    pub items: Vec<ItemResponse>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            product_name: product.product_name,
            created_by: product.created_by,
            created_on: product.created_on,
            modified_by: product.modified_by,
            modified_on: product.modified_on,
            items: product.items.into_iter().map(ItemResponse::from).collect(),
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<T>,
}

impl From<ProductPage> for PaginatedResponse<ProductResponse> {
    fn from(page: ProductPage) -> Self {
        Self {
            page: page.page,
            page_size: page.page_size,
            total: page.total,
            items: page.products.into_iter().map(ProductResponse::from).collect(),
        }
    }
}
