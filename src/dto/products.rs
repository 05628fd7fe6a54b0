use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    dto::validate_not_blank, entity::sea_orm_active_enums::ProductCondition,
    models::ProductWithSeller,
};

pub const MAX_IMAGES_PER_PRODUCT: usize = 10;

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title is required"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[schema(value_type = f64)]
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    #[validate(
        length(min = 1, max = 100, message = "Category is required"),
        custom(function = "validate_not_blank")
    )]
    pub category: String,
    pub condition: ProductCondition,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: i32,
    #[serde(default)]
    #[validate(custom(function = "validate_image_urls"))]
    pub images: Vec<String>,
}

/// Product fields a seller may change. `images`, when present, replaces the whole set.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub category: Option<String>,
    pub condition: Option<ProductCondition>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i32>,
    #[validate(custom(function = "validate_image_urls"))]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductWithSeller>)]
    pub items: Vec<ProductWithSeller>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(ValidationError::new("price").with_message("Price must be positive".into()));
    }
    if *price > Decimal::from(1_000_000) {
        return Err(ValidationError::new("price").with_message("Price is too large".into()));
    }
    if price.normalize().scale() > 2 {
        return Err(
            ValidationError::new("price").with_message("Price has more than two decimals".into()),
        );
    }
    Ok(())
}

fn validate_image_urls(images: &Vec<String>) -> Result<(), ValidationError> {
    if images.len() > MAX_IMAGES_PER_PRODUCT {
        return Err(ValidationError::new("images").with_message("Too many images".into()));
    }
    let valid = images.iter().all(|url| {
        let url = url.trim();
        url.starts_with("https://") || url.starts_with("http://") || url.starts_with("/uploads/")
    });
    if !valid {
        return Err(ValidationError::new("images").with_message("Invalid image url".into()));
    }
    Ok(())
}
