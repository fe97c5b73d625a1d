//! Orders: checkout, cancellation, fulfilment status and payment.
//!
//! Checkout locks every product in the cart in ascending ID order, freezes
//! prices and each seller's commission rate, and takes stock in the same
//! transaction that inserts the order. Orders come either from lines in the
//! request or from the buyer's stored cart.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use atelier_core::{
    CommissionRate, ItemPricing, LedgerEntry, Money, OrderId, OrderStatus, OrderTotals, Page,
    ProductId, Quantity, UserId,
};

use super::cart::quantity_from;
use super::notifications::{DomainEvent, NotificationDispatcher};
use super::wallet::post_entry;
use super::ServiceError;
use crate::db::orders::NewOrderItem;
use crate::db::{OrderRepository, ProductRepository, carts, catalog, orders, users, wallets};
use crate::models::{Order, Product, User};

const MAX_ADDRESS_LENGTH: usize = 500;
const MAX_REFERENCE_LENGTH: usize = 255;

/// One cart line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Checkout of the buyer's stored cart.
#[derive(Debug, Clone, Deserialize)]
pub struct CartCheckout {
    pub shipping_address: String,
    #[serde(default)]
    pub shipping_cost: Decimal,
}

/// A checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub items: Vec<CartItem>,
    pub shipping_address: String,
    #[serde(default)]
    pub shipping_cost: Decimal,
}

/// Who is moving an order along its fulfilment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusActor {
    /// Staff may update any order.
    Staff(UserId),
    /// Sellers may update orders containing their items.
    Seller(UserId),
}

/// Check cart lines: non-empty, positive quantities, no repeated product.
fn validate_cart(items: &[CartItem]) -> Result<Vec<(ProductId, Quantity)>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::validation("cart is empty"));
    }
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(|item| {
            if !seen.insert(item.product_id) {
                return Err(ServiceError::validation(format!(
                    "product {} appears more than once",
                    item.product_id
                )));
            }
            Ok((item.product_id, quantity_from(item.quantity)?))
        })
        .collect()
}

fn validate_address(address: &str) -> Result<&str, ServiceError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ServiceError::validation("shipping address cannot be empty"));
    }
    if address.chars().count() > MAX_ADDRESS_LENGTH {
        return Err(ServiceError::validation(format!(
            "shipping address must be at most {MAX_ADDRESS_LENGTH} characters"
        )));
    }
    Ok(address)
}

fn distinct_sellers(order: &Order) -> Vec<UserId> {
    order
        .items
        .iter()
        .map(|i| i.seller_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Order operations.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    default_rate: CommissionRate,
    dispatcher: NotificationDispatcher,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub const fn new(
        pool: PgPool,
        default_rate: CommissionRate,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            pool,
            default_rate,
            dispatcher,
        }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an invalid cart, an unavailable
    /// product, a quantity above current stock or a total above
    /// [`Money::MAX`], and `ServiceError::Conflict` if stock ran out while
    /// the order was placed.
    #[instrument(skip(self, new), fields(buyer_id = %buyer_id, lines = new.items.len()))]
    pub async fn create_order(
        &self,
        buyer_id: UserId,
        new: NewOrder,
    ) -> Result<Order, ServiceError> {
        let lines = validate_cart(&new.items)?;
        let shipping_cost = Money::new(new.shipping_cost)?;
        let address = validate_address(&new.shipping_address)?;
        self.check_available(&lines).await?;

        let mut tx = self.pool.begin().await?;
        let order = self
            .place(&mut *tx, buyer_id, &lines, address, shipping_cost)
            .await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %order.total_amount, "Created order");
        Ok(order)
    }

    /// Place an order from the buyer's cart and empty the cart.
    ///
    /// The cart stays locked from the read to the commit, so lines added
    /// meanwhile are neither ordered nor lost.
    ///
    /// # Errors
    ///
    /// As for [`Self::create_order`]; an empty cart is a
    /// `ServiceError::Validation`.
    #[instrument(skip(self, checkout), fields(buyer_id = %buyer_id))]
    pub async fn checkout_cart(
        &self,
        buyer_id: UserId,
        checkout: CartCheckout,
    ) -> Result<Order, ServiceError> {
        let shipping_cost = Money::new(checkout.shipping_cost)?;
        let address = validate_address(&checkout.shipping_address)?;

        let mut tx = self.pool.begin().await?;
        let cart = carts::lock(&mut *tx, buyer_id)
            .await
            .map_err(super::missing("user"))?;
        if cart.lines.is_empty() {
            return Err(ServiceError::validation("cart is empty"));
        }
        let lines: Vec<(ProductId, Quantity)> = cart
            .lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        self.check_available(&lines).await?;

        let order = self
            .place(&mut *tx, buyer_id, &lines, address, shipping_cost)
            .await?;
        carts::clear(&mut *tx, cart.id).await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %order.total_amount, "Checked out cart");
        Ok(order)
    }

    /// Reject lines whose product is inactive or short of stock, before any
    /// lock is taken.
    async fn check_available(&self, lines: &[(ProductId, Quantity)]) -> Result<(), ServiceError> {
        let products = ProductRepository::new(&self.pool);
        for (product_id, quantity) in lines {
            let product = products
                .get(*product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::validation(format!("product {product_id} is not available"))
                })?;
            if product.stock < quantity.get() {
                return Err(ServiceError::validation(format!(
                    "only {} of product {product_id} in stock",
                    product.stock
                )));
            }
        }
        Ok(())
    }

    /// Lock the products, price every line at its seller's rate, take stock
    /// and insert the order, all inside the caller's transaction.
    async fn place(
        &self,
        conn: &mut PgConnection,
        buyer_id: UserId,
        lines: &[(ProductId, Quantity)],
        address: &str,
        shipping_cost: Money,
    ) -> Result<Order, ServiceError> {
        let ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        let locked: HashMap<ProductId, Product> = catalog::lock_products(&mut *conn, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let seller_ids: Vec<UserId> = locked
            .values()
            .map(|p| p.seller_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rates: HashMap<UserId, CommissionRate> = users::profiles_for(&mut *conn, &seller_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p.effective_commission_rate(self.default_rate)))
            .collect();

        let mut totals = OrderTotals::with_shipping(shipping_cost);
        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = locked
                .get(product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::Conflict(format!("product {product_id} is no longer available"))
                })?;
            if product.stock < quantity.get()
                || !catalog::take_stock(&mut *conn, *product_id, *quantity).await?
            {
                return Err(ServiceError::Conflict(format!(
                    "product {product_id} sold out while ordering"
                )));
            }

            let rate = rates
                .get(&product.seller_id)
                .copied()
                .unwrap_or(self.default_rate);
            let pricing = ItemPricing::compute(product.price, *quantity, rate)?;
            totals.add(&pricing)?;
            items.push(NewOrderItem {
                product_id: *product_id,
                seller_id: product.seller_id,
                rate,
                pricing,
            });
        }

        let order = orders::insert(
            conn,
            buyer_id,
            address,
            shipping_cost,
            totals.total()?,
            &items,
        )
        .await?;
        info!(commission = %totals.commission, "Priced order");
        Ok(order)
    }

    /// Cancel one of the buyer's orders.
    ///
    /// Stock is restored and a paid order is refunded to the buyer's wallet
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the buyer has no such order and
    /// `ServiceError::InvalidState` unless it is pending or processing and
    /// not yet settled.
    #[instrument(skip(self), fields(buyer_id = %buyer_id, order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        buyer_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut *tx, order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| ServiceError::not_found("order"))?;
        if order.is_settled() {
            return Err(ServiceError::InvalidState(format!(
                "order {order_id} has already been settled"
            )));
        }
        let status = order.status.cancel()?;

        let mut restock: Vec<_> = order.items.iter().map(|i| (i.product_id, i.quantity)).collect();
        restock.sort_unstable_by_key(|(id, _)| *id);
        for (product_id, quantity) in restock {
            catalog::restore_stock(&mut *tx, product_id, quantity).await?;
        }
        orders::set_status(&mut *tx, order_id, status).await?;

        let refunded = if order.payment_status && !order.total_amount.is_zero() {
            let mut wallet = wallets::lock_user_wallet(&mut *tx, buyer_id).await?;
            post_entry(
                &mut *tx,
                &mut wallet,
                LedgerEntry::refund(order.total_amount)?,
                Some(&order.ledger_reference()),
                &format!("Refund for cancelled order #{order_id}"),
            )
            .await?;
            Some(order.total_amount)
        } else {
            None
        };

        let cancelled = orders::fetch(&mut *tx, order_id, false)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        tx.commit().await?;

        info!(refunded = ?refunded.map(|m| m.to_string()), "Cancelled order");
        self.dispatcher
            .dispatch(DomainEvent::OrderCancelled {
                buyer_id,
                order_id,
                sellers: distinct_sellers(&cancelled),
                refunded,
            })
            .await;

        Ok(cancelled)
    }

    /// Move an order one step along pending, processing, shipped, delivered.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the order does not exist or the
    /// seller has no items in it, and `ServiceError::InvalidState` for any
    /// transition other than the next forward step.
    #[instrument(skip(self), fields(order_id = %order_id, target = %target))]
    pub async fn update_status(
        &self,
        actor: StatusActor,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut *tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        if let StatusActor::Seller(seller_id) = actor
            && !order.items.iter().any(|i| i.seller_id == seller_id)
        {
            return Err(ServiceError::not_found("order"));
        }

        let status = order.status.advance_to(target)?;
        orders::set_status(&mut *tx, order_id, status).await?;
        let mut updated = orders::fetch(&mut *tx, order_id, false)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        tx.commit().await?;

        info!(?actor, from = %order.status, "Updated order status");
        self.dispatcher
            .dispatch(DomainEvent::OrderStatusChanged {
                buyer_id: updated.buyer_id,
                order_id,
                status,
            })
            .await;

        if let StatusActor::Seller(seller_id) = actor {
            updated.items.retain(|i| i.seller_id == seller_id);
        }
        Ok(updated)
    }

    /// Record an external payment for an order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` if the order is already paid and
    /// `ServiceError::InvalidState` if it was cancelled.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        reference: &str,
    ) -> Result<Order, ServiceError> {
        let reference = reference.trim();
        if reference.is_empty() || reference.chars().count() > MAX_REFERENCE_LENGTH {
            return Err(ServiceError::validation(format!(
                "payment reference must be 1 to {MAX_REFERENCE_LENGTH} characters"
            )));
        }

        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut *tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        Self::check_payable(&order)?;

        orders::mark_paid(&mut *tx, order_id, reference).await?;
        let paid = orders::fetch(&mut *tx, order_id, false)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        tx.commit().await?;

        info!("Confirmed payment");
        self.dispatcher
            .dispatch(DomainEvent::PaymentConfirmed {
                buyer_id: paid.buyer_id,
                order_id,
                amount: paid.total_amount,
            })
            .await;
        Ok(paid)
    }

    /// Pay for an order from the buyer's wallet.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the buyer has no such order,
    /// `ServiceError::Conflict` if it is already paid,
    /// `ServiceError::InvalidState` if it was cancelled, and
    /// `ServiceError::InsufficientFunds` if the wallet cannot cover it.
    #[instrument(skip(self), fields(buyer_id = %buyer_id, order_id = %order_id))]
    pub async fn pay_with_wallet(
        &self,
        buyer_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut *tx, order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| ServiceError::not_found("order"))?;
        Self::check_payable(&order)?;

        let reference = if order.total_amount.is_zero() {
            order.ledger_reference()
        } else {
            let mut wallet = wallets::lock_user_wallet(&mut *tx, buyer_id).await?;
            let txn = post_entry(
                &mut *tx,
                &mut wallet,
                LedgerEntry::purchase(order.total_amount)?,
                Some(&order.ledger_reference()),
                &format!("Payment for order #{order_id}"),
            )
            .await?;
            format!("wallet:{}", txn.id)
        };

        orders::mark_paid(&mut *tx, order_id, &reference).await?;
        let paid = orders::fetch(&mut *tx, order_id, false)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        tx.commit().await?;

        info!(reference = %reference, "Paid order from wallet");
        self.dispatcher
            .dispatch(DomainEvent::PaymentConfirmed {
                buyer_id,
                order_id,
                amount: paid.total_amount,
            })
            .await;
        Ok(paid)
    }

    fn check_payable(order: &Order) -> Result<(), ServiceError> {
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidState(format!(
                "order {} is cancelled",
                order.id
            )));
        }
        if order.payment_status {
            return Err(ServiceError::Conflict(format!(
                "order {} is already paid",
                order.id
            )));
        }
        Ok(())
    }

    /// Get an order as seen by `viewer`.
    ///
    /// Buyers and staff see the whole order; sellers see only their items.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if it does not exist or the viewer
    /// has no part in it.
    pub async fn get_order(&self, viewer: &User, order_id: OrderId) -> Result<Order, ServiceError> {
        let mut order = OrderRepository::new(&self.pool)
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        if order.buyer_id == viewer.id || viewer.is_staff {
            return Ok(order);
        }
        order.items.retain(|i| i.seller_id == viewer.id);
        if order.items.is_empty() {
            return Err(ServiceError::not_found("order"));
        }
        Ok(order)
    }

    /// The buyer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_orders(
        &self,
        buyer_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Order>, ServiceError> {
        Ok(OrderRepository::new(&self.pool)
            .list_for_buyer(buyer_id, limit, offset)
            .await?)
    }

    /// Orders containing the seller's items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_seller_orders(
        &self,
        seller_id: UserId,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Order>, ServiceError> {
        Ok(OrderRepository::new(&self.pool)
            .list_for_seller(seller_id, status, limit, offset)
            .await?)
    }
}
