use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

pub const MAX_PRODUCT_NAME_LENGTH: usize = 255;

/// Request to create a product.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreateRequest {
    #[validate(custom = "validate_product_name")]
    pub product_name: String,
}

/// Request to rename a product.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateRequest {
    #[validate(custom = "validate_product_name")]
    pub product_name: String,
}

/// Request to add an item to a product.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreateRequest {
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub quantity: i32,
}

/// Query parameters for listing products.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn validate_product_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(invalid("required", "must not be empty"));
    }
    if name.chars().count() > MAX_PRODUCT_NAME_LENGTH {
        return Err(invalid("length", "must be 255 characters or fewer"));
    }
    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}
