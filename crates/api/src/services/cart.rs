//! The per-user shopping cart.
//!
//! Cart edits check the requested quantity against current stock but do not
//! reserve it; checkout (see [`super::OrderService::checkout_cart`]) takes
//! stock under product locks.

use sqlx::PgPool;
use tracing::{info, instrument};

use atelier_core::{Money, ProductId, Quantity, UserId};

use super::{ServiceError, missing};
use crate::db::{CartRepository, ProductRepository, carts};
use crate::models::Cart;

/// Convert a requested quantity, rejecting zero and negatives.
pub(crate) fn quantity_from(requested: i64) -> Result<Quantity, ServiceError> {
    let requested =
        u32::try_from(requested).map_err(|_| ServiceError::validation("quantity must be at least 1"))?;
    Ok(Quantity::new(requested)?)
}

/// Cart operations.
#[derive(Clone)]
pub struct CartService {
    pool: PgPool,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart, created empty on first access.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, ServiceError> {
        CartRepository::new(&self.pool)
            .get_or_create(user_id)
            .await
            .map_err(missing("user"))
    }

    /// Add units of a product, on top of any already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a non-positive quantity or one
    /// that would exceed stock, and `ServiceError::NotFound` if the product
    /// is missing or inactive.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, ServiceError> {
        let quantity = quantity_from(quantity)?;
        self.set_line(user_id, product_id, |current| {
            let total = current
                .map_or(Some(quantity.get()), |c| c.get().checked_add(quantity.get()))
                .unwrap_or(u32::MAX);
            Ok(Quantity::new(total)?)
        })
        .await
    }

    /// Set the quantity of a product. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// As for [`Self::add_item`], and `ServiceError::NotFound` when removing
    /// a product that is not in the cart.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, ServiceError> {
        if quantity <= 0 {
            return self.remove_item(user_id, product_id).await;
        }
        let quantity = quantity_from(quantity)?;
        self.set_line(user_id, product_id, |_| Ok(quantity)).await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the product is not in the cart.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::lock(&mut *tx, user_id)
            .await
            .map_err(missing("user"))?;
        if !carts::remove(&mut *tx, cart.id, product_id).await? {
            return Err(ServiceError::not_found("cart item"));
        }
        let cart = carts::lock(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::lock(&mut *tx, user_id)
            .await
            .map_err(missing("user"))?;
        let removed = carts::clear(&mut *tx, cart.id).await?;
        let cart = carts::lock(&mut *tx, user_id).await?;
        tx.commit().await?;
        info!(removed, "Cleared cart");
        Ok(cart)
    }

    /// Lock the cart, compute the line's new quantity from its current one
    /// and store it if stock covers it.
    async fn set_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        next: impl FnOnce(Option<Quantity>) -> Result<Quantity, ServiceError>,
    ) -> Result<Cart, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::lock(&mut *tx, user_id)
            .await
            .map_err(missing("user"))?;

        let product = ProductRepository::new(&self.pool)
            .get(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::not_found("product"))?;

        let current = cart
            .lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity);
        let quantity = next(current)?;
        if quantity.get() > product.stock {
            return Err(ServiceError::validation(format!(
                "only {} of product {product_id} in stock",
                product.stock
            )));
        }
        if product.price.times(quantity).is_err() {
            return Err(ServiceError::validation(format!(
                "line total for product {product_id} would exceed {}",
                Money::MAX
            )));
        }

        carts::set_quantity(&mut *tx, cart.id, product_id, quantity).await?;
        let cart = carts::lock(&mut *tx, user_id).await?;
        tx.commit().await?;

        info!(quantity = %quantity, "Updated cart line");
        Ok(cart)
    }
}
