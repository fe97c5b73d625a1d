//! Shopping cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use atelier_core::{CartId, CartItemId, Money, ProductId, Quantity};

/// One product in a cart, priced at the product's current price.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
    /// Stock at the time the cart was read.
    pub stock: u32,
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// `unit_price * quantity` without the [`Money::MAX`] bound, for display.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.amount() * Decimal::from(self.quantity.get())
    }
}

/// A user's cart with display totals.
///
/// Totals follow current prices; checkout prices the lines again under
/// the product locks.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub lines: Vec<CartLine>,
    pub total_items: u64,
    pub subtotal: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    #[must_use]
    pub fn new(id: CartId, lines: Vec<CartLine>, updated_at: DateTime<Utc>) -> Self {
        let total_items = lines.iter().map(|l| u64::from(l.quantity.get())).sum();
        let subtotal = lines.iter().map(CartLine::line_total).sum();
        Self {
            id,
            lines,
            total_items,
            subtotal,
            updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: &str, quantity: u32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: price.parse().unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
            stock: 10,
            is_active: true,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals() {
        let cart = Cart::new(
            CartId::new(1),
            vec![line(1, "12.50", 2), line(2, "0.99", 3)],
            Utc::now(),
        );
        assert_eq!(cart.total_items, 5);
        assert_eq!(cart.subtotal, Decimal::new(2797, 2));
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["subtotal"], "27.97");
    }

    #[test]
    fn test_totals_past_money_bound_still_display() {
        let cart = Cart::new(
            CartId::new(1),
            vec![line(1, "9999999999.99", 2)],
            Utc::now(),
        );
        assert_eq!(cart.subtotal, Decimal::new(1_999_999_999_998, 2));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::new(CartId::new(1), Vec::new(), Utc::now());
        assert_eq!(cart.total_items, 0);
        assert!(cart.subtotal.is_zero());
    }
}
