//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{CategoryId, Money, ProductId, Rating, ReviewId, UserId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product listed by a seller.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A buyer's rating of a product.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
