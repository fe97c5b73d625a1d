//! Order repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use atelier_core::{
    CommissionRate, ItemPricing, Money, OrderId, OrderItemId, OrderStatus, Page, ProductId,
    Quantity, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    buyer_id: UserId,
    status: OrderStatus,
    total_amount: Money,
    shipping_cost: Money,
    shipping_address: String,
    payment_status: bool,
    payment_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn with_items(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            status: self.status,
            total_amount: self.total_amount,
            shipping_cost: self.shipping_cost,
            shipping_address: self.shipping_address,
            payment_status: self.payment_status,
            payment_reference: self.payment_reference,
            paid_at: self.paid_at,
            settled_at: self.settled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    seller_id: UserId,
    quantity: i32,
    price: Money,
    commission_rate: CommissionRate,
    commission_amount: Money,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::try_from(row.quantity).map_err(|e| RepositoryError::corrupt("quantity", e))?;
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            seller_id: row.seller_id,
            quantity,
            price: row.price,
            commission_rate: row.commission_rate,
            commission_amount: row.commission_amount,
        })
    }
}

const ORDER_COLUMNS: &str = "id, buyer_id, status, total_amount, shipping_cost, shipping_address, \
                             payment_status, payment_reference, paid_at, settled_at, \
                             created_at, updated_at";
const ITEM_COLUMNS: &str =
    "id, order_id, product_id, seller_id, quantity, price, commission_rate, commission_amount";

/// Load items for a set of orders and attach them.
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;

    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let item = OrderItem::try_from(row)?;
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.with_items(items)
        })
        .collect())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut *conn, id, false).await
    }

    /// List a buyer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_buyer(
        &self,
        buyer_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
            .bind(buyer_id)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE buyer_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(buyer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Page {
            count,
            results: attach_items(&mut *conn, rows).await?,
        })
    }

    /// List orders containing at least one of the seller's items, newest first.
    ///
    /// Each order lists only the seller's own items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_seller(
        &self,
        seller_id: UserId,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Order>, RepositoryError> {
        const WHERE: &str = "WHERE EXISTS (
                 SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.seller_id = $1
             ) AND ($2::order_status IS NULL OR o.status = $2)";

        let mut conn = self.pool.acquire().await?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders o {WHERE}"))
            .bind(seller_id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o {WHERE}
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(seller_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = attach_items(&mut *conn, rows).await?;
        for order in &mut orders {
            order.items.retain(|item| item.seller_id == seller_id);
        }

        Ok(Page {
            count,
            results: orders,
        })
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Fetch an order with its items, optionally locking the order row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fetch(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Lock an order row and load its items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    fetch(conn, id, true).await
}

/// A priced line ready to be inserted.
#[derive(Debug, Clone, Copy)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub rate: CommissionRate,
    pub pricing: ItemPricing,
}

/// Insert an order and its items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    buyer_id: UserId,
    shipping_address: &str,
    shipping_cost: Money,
    total_amount: Money,
    items: &[NewOrderItem],
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders (buyer_id, total_amount, shipping_cost, shipping_address)
         VALUES ($1, $2, $3, $4)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(buyer_id)
    .bind(total_amount)
    .bind(shipping_cost)
    .bind(shipping_address)
    .fetch_one(&mut *conn)
    .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO order_items
                 (order_id, product_id, seller_id, quantity, price, commission_rate, commission_amount)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(item.product_id)
        .bind(item.seller_id)
        .bind(item.pricing.quantity.as_i32())
        .bind(item.pricing.unit_price)
        .bind(item.rate)
        .bind(item.pricing.commission)
        .execute(&mut *conn)
        .await?;
    }

    attach_items(conn, vec![row])
        .await?
        .pop()
        .ok_or(RepositoryError::NotFound)
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Flip the payment flag on an unpaid order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order is already paid.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
    reference: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE orders
         SET payment_status = TRUE, payment_reference = $2, paid_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND NOT payment_status",
    )
    .bind(id)
    .bind(reference)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict("order already paid".to_owned()));
    }
    Ok(())
}

/// Record settlement on a paid, unsettled order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order is already settled.
pub async fn mark_settled(conn: &mut PgConnection, id: OrderId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE orders SET settled_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND payment_status AND settled_at IS NULL",
    )
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict("order already settled".to_owned()));
    }
    Ok(())
}
