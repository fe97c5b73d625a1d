//! Integration tests for the shopping cart and product reviews.
//!
//! Require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p atelier-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use atelier_api::services::{CartCheckout, ProductInput, ReviewInput, ServiceError};
use atelier_core::{Money, Quantity, UserRole};
use atelier_integration_tests::{category, customer, dec, product, seller, staff, state, stock};

fn money(s: &str) -> Money {
    Money::new(dec(s)).unwrap()
}

fn checkout() -> CartCheckout {
    CartCheckout {
        shipping_address: "12 Harbour Road, Porto".to_owned(),
        shipping_cost: Decimal::ZERO,
    }
}

fn review(rating: i64, comment: &str) -> ReviewInput {
    ReviewInput {
        rating,
        comment: Some(comment.to_owned()),
    }
}

// ============================================================================
// Cart
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_lines_and_totals(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let cat = category(&state, "Ceramics").await;
    let mug = product(&state, &artist, cat, "12.50", 4).await;
    let bowl = product(&state, &artist, cat, "30.00", 2).await;
    let carts = state.cart();

    let empty = carts.get_cart(buyer.id).await.unwrap();
    assert!(empty.lines.is_empty());
    assert!(empty.subtotal.is_zero());

    carts.add_item(buyer.id, mug.id, 1).await.unwrap();
    let cart = carts.add_item(buyer.id, mug.id, 2).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, Quantity::new(3).unwrap());

    let cart = carts.add_item(buyer.id, bowl.id, 1).await.unwrap();
    assert_eq!(cart.id, empty.id);
    assert_eq!(cart.total_items, 4);
    assert_eq!(cart.subtotal, dec("67.50"));

    let cart = carts.update_item(buyer.id, mug.id, 1).await.unwrap();
    assert_eq!(cart.subtotal, dec("42.50"));

    let cart = carts.update_item(buyer.id, bowl.id, 0).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    let missing = carts.remove_item(buyer.id, bowl.id).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let cart = carts.clear(buyer.id).await.unwrap();
    assert!(cart.lines.is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_rejects_unavailable_lines(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let cat = category(&state, "Ceramics").await;
    let vase = product(&state, &artist, cat, "100.00", 2).await;
    let carts = state.cart();

    for quantity in [0, -1] {
        let result = carts.add_item(buyer.id, vase.id, quantity).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    carts.add_item(buyer.id, vase.id, 2).await.unwrap();
    let over = carts.add_item(buyer.id, vase.id, 1).await;
    assert!(matches!(over, Err(ServiceError::Validation(_))));

    let unknown = carts.add_item(buyer.id, 99_999.into(), 1).await;
    assert!(matches!(unknown, Err(ServiceError::NotFound(_))));

    state
        .catalog()
        .update_product(
            artist.id,
            vase.id,
            ProductInput {
                category_id: cat,
                name: vase.name.clone(),
                description: String::new(),
                price: dec("100.00"),
                stock: 2,
                is_active: false,
            },
        )
        .await
        .unwrap();
    let hidden = carts.update_item(buyer.id, vase.id, 1).await;
    assert!(matches!(hidden, Err(ServiceError::NotFound(_))));
    let cart = carts.get_cart(buyer.id).await.unwrap();
    assert!(!cart.lines[0].is_active);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_orders_and_empties_cart(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let cat = category(&state, "Ceramics").await;
    let mug = product(&state, &artist, cat, "25.00", 4).await;
    let plate = product(&state, &artist, cat, "18.00", 3).await;

    let empty = state.orders().checkout_cart(buyer.id, checkout()).await;
    assert!(matches!(empty, Err(ServiceError::Validation(_))));

    state.cart().add_item(buyer.id, mug.id, 2).await.unwrap();
    state.cart().add_item(buyer.id, plate.id, 1).await.unwrap();
    let order = state
        .orders()
        .checkout_cart(buyer.id, checkout())
        .await
        .unwrap();
    assert_eq!(order.buyer_id, buyer.id);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_amount, money("68.00"));
    assert_eq!(stock(&state, &artist, mug.id).await, 2);
    assert_eq!(stock(&state, &artist, plate.id).await, 2);

    let cart = state.cart().get_cart(buyer.id).await.unwrap();
    assert!(cart.lines.is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_checkout_keeps_cart(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let rival = customer(&state, "rival@atelier.test").await;
    let cat = category(&state, "Paintings").await;
    let canvas = product(&state, &artist, cat, "120.00", 1).await;

    state.cart().add_item(buyer.id, canvas.id, 1).await.unwrap();
    state.cart().add_item(rival.id, canvas.id, 1).await.unwrap();
    state
        .orders()
        .checkout_cart(rival.id, checkout())
        .await
        .unwrap();

    let sold_out = state.orders().checkout_cart(buyer.id, checkout()).await;
    assert!(matches!(sold_out, Err(ServiceError::Validation(_))));
    let cart = state.cart().get_cart(buyer.id).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(stock(&state, &artist, canvas.id).await, 0);
}

// ============================================================================
// Reviews
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reviews_once_per_buyer_with_average(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let cat = category(&state, "Ceramics").await;
    let vase = product(&state, &artist, cat, "100.00", 5).await;
    let catalog = state.catalog();

    let none = catalog.list_reviews(vase.id, None, 20, 0).await.unwrap();
    assert_eq!(none.page.count, 0);
    assert_eq!(none.average_rating, None);

    for (email, rating) in [("a@atelier.test", 5), ("b@atelier.test", 4), ("c@atelier.test", 4)] {
        let buyer = customer(&state, email).await;
        catalog
            .add_review(buyer.id, vase.id, review(rating, "Lovely glaze"))
            .await
            .unwrap();
    }

    let listed = catalog.list_reviews(vase.id, None, 2, 0).await.unwrap();
    assert_eq!(listed.page.count, 3);
    assert_eq!(listed.page.results.len(), 2);
    assert_eq!(listed.average_rating, Some(dec("4.33")));

    let repeat = customer(&state, "d@atelier.test").await;
    catalog
        .add_review(repeat.id, vase.id, review(3, "Fine"))
        .await
        .unwrap();
    let again = catalog.add_review(repeat.id, vase.id, review(1, "Changed my mind")).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_invalid_reviews_rejected(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let cat = category(&state, "Ceramics").await;
    let vase = product(&state, &artist, cat, "100.00", 5).await;
    let catalog = state.catalog();

    for rating in [0, 6] {
        let result = catalog.add_review(buyer.id, vase.id, review(rating, "")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    let own = catalog.add_review(artist.id, vase.id, review(5, "Mine")).await;
    assert!(matches!(own, Err(ServiceError::Validation(_))));

    let missing = catalog
        .add_review(buyer.id, 99_999.into(), review(5, "Ghost"))
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let listed = catalog.list_reviews(vase.id, None, 20, 0).await.unwrap();
    assert_eq!(listed.page.count, 0);
}
