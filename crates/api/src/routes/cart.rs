//! The caller's shopping cart and checkout from it.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use atelier_core::ProductId;

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{Cart, Order};
use crate::services::CartCheckout;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i64,
}

const fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: i64,
}

/// GET /api/cart
///
/// # Errors
///
/// Returns 500 if the cart cannot be loaded.
pub async fn get_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(state.cart().get_cart(user.id).await?))
}

/// Add a product, or more of one already in the cart.
///
/// POST /api/cart/items
///
/// # Errors
///
/// Returns 400 for a non-positive quantity or one above stock, and 404 if
/// the product is not for sale.
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<AddItem>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(
        state
            .cart()
            .add_item(user.id, req.product_id, req.quantity)
            .await?,
    ))
}

/// Set a line's quantity; zero or less removes it.
///
/// PUT /api/cart/items/{product_id}
///
/// # Errors
///
/// Returns 400 for a quantity above stock and 404 for an unknown line.
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Json(req): Json<QuantityUpdate>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(
        state
            .cart()
            .update_item(user.id, product_id, req.quantity)
            .await?,
    ))
}

/// DELETE /api/cart/items/{product_id}
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(state.cart().remove_item(user.id, product_id).await?))
}

/// DELETE /api/cart
///
/// # Errors
///
/// Returns 500 if the cart cannot be emptied.
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(state.cart().clear(user.id).await?))
}

/// Turn the cart into an order and empty it.
///
/// POST /api/cart/checkout
///
/// # Errors
///
/// Returns 400 for an empty cart or short stock and 409 if stock ran out
/// while the order was placed.
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<CartCheckout>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.orders().checkout_cart(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
