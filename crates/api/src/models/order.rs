//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{
    CommissionRate, Money, MoneyError, OrderId, OrderItemId, OrderStatus, ProductId, Quantity,
    UserId,
};

/// A line of an order with its price and commission frozen at purchase.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub quantity: Quantity,
    pub price: Money,
    pub commission_rate: CommissionRate,
    pub commission_amount: Money,
}

impl OrderItem {
    /// `price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the product exceeds [`Money::MAX`].
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.price.times(self.quantity)
    }

    /// Amount credited to the seller at settlement.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] if stored amounts are inconsistent.
    pub fn seller_credit(&self) -> Result<Money, MoneyError> {
        self.line_total()?.checked_sub(self.commission_amount)
    }
}

/// An order and its items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_cost: Money,
    pub shipping_address: String,
    pub payment_status: bool,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Whether settlement credits have been posted.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }

    /// Reference recorded on ledger entries for this order.
    #[must_use]
    pub fn ledger_reference(&self) -> String {
        ledger_reference(self.id)
    }
}

/// Ledger reference for an order: `order:<id>`.
#[must_use]
pub fn ledger_reference(id: OrderId) -> String {
    format!("order:{id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_seller_credit() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(7),
            product_id: ProductId::new(3),
            seller_id: UserId::new(2),
            quantity: Quantity::new(2).unwrap(),
            price: "100.00".parse().unwrap(),
            commission_rate: CommissionRate::DEFAULT,
            commission_amount: "20.00".parse().unwrap(),
        };
        assert_eq!(item.line_total().unwrap().to_string(), "200.00");
        assert_eq!(item.seller_credit().unwrap().to_string(), "180.00");
    }

    #[test]
    fn test_ledger_reference_format() {
        assert_eq!(ledger_reference(OrderId::new(42)), "order:42");
    }
}
