//! Checkout, buyer order management and seller fulfilment.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use atelier_core::{OrderId, OrderStatus, Page, PageRequest};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::services::{NewOrder, StatusActor};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct SellerOrderQuery {
    pub status: Option<OrderStatus>,
}

/// Place an order from cart lines.
///
/// POST /api/orders
///
/// # Errors
///
/// Returns 400 for an invalid cart or short stock and 409 if stock ran out
/// while the order was placed.
pub async fn create_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(new): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.orders().create_order(user.id, new).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Order>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state.orders().list_orders(user.id, limit, offset).await?,
    ))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 unless the caller bought the order, sold items in it or is
/// staff.
pub async fn get_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders().get_order(&user, id).await?))
}

/// POST /api/orders/{id}/cancel
///
/// # Errors
///
/// Returns 404 if the caller did not place the order and 409 unless it is
/// pending or processing.
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders().cancel_order(user.id, id).await?))
}

/// Pay for an order from the buyer's wallet.
///
/// POST /api/orders/{id}/pay
///
/// # Errors
///
/// Returns 422 if the wallet cannot cover the total and 409 if the order is
/// already paid or cancelled.
pub async fn pay_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders().pay_with_wallet(user.id, id).await?))
}

/// Orders containing the caller's items.
///
/// GET /api/seller/orders
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_seller_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<SellerOrderQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Order>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .orders()
            .list_seller_orders(user.id, query.status, limit, offset)
            .await?,
    ))
}

/// PUT /api/seller/orders/{id}/status
///
/// # Errors
///
/// Returns 404 if the order holds none of the caller's items and 409 for
/// anything but the next forward step.
pub async fn update_seller_order_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        state
            .orders()
            .update_status(StatusActor::Seller(user.id), id, update.status)
            .await?,
    ))
}
