//! Product and category endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use atelier_core::{CategoryId, Page, PageRequest, ProductId, UserId};

use crate::db::catalog::{ProductFilter, ProductRemoval};
use crate::error::AppError;
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::{Category, Product, Review};
use crate::services::{ProductInput, ReviewInput, ReviewList};
use crate::state::AppState;

/// Query parameters for product browsing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub seller_id: Option<UserId>,
    pub search: Option<String>,
    /// Only honoured when a seller lists their own products.
    #[serde(default)]
    pub include_inactive: bool,
}

impl ProductQuery {
    fn into_filter(self, viewer: Option<UserId>) -> ProductFilter {
        let own_listing = self.seller_id.is_some() && self.seller_id == viewer;
        ProductFilter {
            category_id: self.category_id,
            seller_id: self.seller_id,
            search: self
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            include_inactive: self.include_inactive && own_listing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub id: ProductId,
    pub outcome: ProductRemoval,
}

/// GET /api/products
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_products(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<ProductQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Product>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    let filter = query.into_filter(viewer.map(|u| u.id));
    Ok(Json(
        state
            .catalog()
            .list_products(&filter, limit, offset)
            .await?,
    ))
}

/// POST /api/products
///
/// # Errors
///
/// Returns 400 unless the caller is a seller and the fields are valid.
pub async fn create_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog().create_product(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products/{id}
///
/// # Errors
///
/// Returns 404 if the product does not exist or is hidden from the caller.
pub async fn get_product(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        state
            .catalog()
            .get_product(id, viewer.map(|u| u.id))
            .await?,
    ))
}

/// PUT /api/products/{id}
///
/// # Errors
///
/// Returns 404 unless the caller owns the product.
pub async fn update_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        state.catalog().update_product(user.id, id, input).await?,
    ))
}

/// Delete a product, or deactivate it when orders reference it.
///
/// DELETE /api/products/{id}
///
/// # Errors
///
/// Returns 404 unless the caller owns the product.
pub async fn delete_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ProductId>,
) -> Result<Json<RemovalResponse>, AppError> {
    let outcome = state.catalog().delete_product(user.id, id).await?;
    Ok(Json(RemovalResponse { id, outcome }))
}

/// Reviews of a visible product, newest first, with the average rating.
///
/// GET /api/products/{id}/reviews
///
/// # Errors
///
/// Returns 404 if the product does not exist or is hidden from the caller.
pub async fn list_reviews(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<ProductId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<ReviewList>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .catalog()
            .list_reviews(id, viewer.map(|u| u.id), limit, offset)
            .await?,
    ))
}

/// POST /api/products/{id}/reviews
///
/// # Errors
///
/// Returns 400 for a rating outside 1 to 5 or a review of the caller's own
/// product, 404 for a product not for sale, and 409 for a second review.
pub async fn add_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = state.catalog().add_review(user.id, id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /api/categories
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog().list_categories().await?))
}
