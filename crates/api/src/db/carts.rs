//! Shopping cart repository.
//!
//! Every mutation first upserts the user's cart row, which also locks it,
//! so concurrent edits and checkouts of one cart run one at a time.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use atelier_core::{CartId, CartItemId, Money, ProductId, Quantity, UserId};

use super::RepositoryError;
use crate::models::{Cart, CartLine};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    product_id: ProductId,
    name: String,
    price: Money,
    quantity: i32,
    stock: i32,
    is_active: bool,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::try_from(row.quantity).map_err(|e| RepositoryError::corrupt("quantity", e))?;
        let stock = u32::try_from(row.stock).map_err(|e| RepositoryError::corrupt("stock", e))?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            unit_price: row.price,
            quantity,
            stock,
            is_active: row.is_active,
            added_at: row.added_at,
        })
    }
}

/// Repository for cart reads.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's cart, created empty on first access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart = lock(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Lock a user's cart, creating it if needed, and load its lines.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
pub async fn lock(conn: &mut PgConnection, user_id: UserId) -> Result<Cart, RepositoryError> {
    let cart = sqlx::query_as::<_, CartRow>(
        "INSERT INTO carts (user_id) VALUES ($1)
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
         RETURNING id, updated_at",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::NotFound;
        }
        RepositoryError::Database(e)
    })?;

    let lines = sqlx::query_as::<_, CartLineRow>(
        "SELECT i.id, i.product_id, p.name, p.price, i.quantity, p.stock, p.is_active, i.added_at
         FROM cart_items i
         JOIN products p ON p.id = i.product_id
         WHERE i.cart_id = $1
         ORDER BY i.added_at ASC, i.id ASC",
    )
    .bind(cart.id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(TryInto::try_into)
    .collect::<Result<_, _>>()?;

    Ok(Cart::new(cart.id, lines, cart.updated_at))
}

/// Set the quantity of a product in a cart, adding the line if needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn set_quantity(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
    quantity: Quantity,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)
         ON CONFLICT (cart_id, product_id)
         DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity.as_i32())
    .execute(&mut *conn)
    .await?;
    touch(conn, cart_id).await
}

/// Remove a product from a cart. Returns `false` if it was not there.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn remove(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    touch(conn, cart_id).await?;
    Ok(result.rows_affected() == 1)
}

/// Remove every line from a cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn clear(conn: &mut PgConnection, cart_id: CartId) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    touch(conn, cart_id).await?;
    Ok(result.rows_affected())
}

async fn touch(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}
