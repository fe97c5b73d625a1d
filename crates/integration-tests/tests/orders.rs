//! Integration tests for checkout, commission, cancellation and settlement.
//!
//! Require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p atelier-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_api::db::WalletRepository;
use atelier_api::models::User;
use atelier_api::services::{ProductInput, ServiceError, StatusActor};
use atelier_api::state::AppState;
use atelier_core::{Money, OrderStatus, Quantity, TransactionKind, UserRole};
use atelier_integration_tests::{
    cart, category, customer, dec, product, seller as onboard, staff, state, stock,
};

fn money(s: &str) -> Money {
    Money::new(dec(s)).unwrap()
}

struct Market {
    state: AppState,
    admin: User,
    seller: User,
    buyer: User,
}

async fn market(pool: PgPool) -> Market {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let seller = onboard(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    Market {
        state,
        admin,
        seller,
        buyer,
    }
}

// ============================================================================
// Checkout and commission
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_commission_example(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let vase = product(&state, &seller, cat, "100.00", 5).await;

    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(vase.id, 2)]))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, money("200.00"));
    let item = &order.items[0];
    assert_eq!(item.price, money("100.00"));
    assert_eq!(item.quantity, Quantity::new(2).unwrap());
    assert_eq!(item.commission_amount, money("20.00"));
    assert_eq!(item.seller_credit().unwrap(), money("180.00"));
    assert_eq!(stock(&state, &seller, vase.id).await, 3);

    state
        .orders()
        .confirm_payment(order.id, "psp-8841")
        .await
        .unwrap();
    let settlement = state.wallet().settle_order(order.id).await.unwrap();
    assert_eq!(settlement.commission, money("20.00"));
    assert_eq!(settlement.seller_credits[&seller.id], money("180.00"));

    let seller_wallet = state.wallet().get_wallet(seller.id).await.unwrap();
    assert_eq!(seller_wallet.balance, money("180.00"));
    let platform = WalletRepository::new(state.pool())
        .get_platform()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(platform.balance, money("20.00"));

    for audit in state.wallet().audit_all().await.unwrap() {
        assert!(audit.is_consistent(), "{audit:?}");
    }

    let again = state.wallet().settle_order(order.id).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_seller_rate_frozen_at_checkout(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Prints").await;
    let print = product(&state, &seller, cat, "50.00", 10).await;

    state
        .accounts()
        .set_commission_rate(seller.id, Some("5".parse().unwrap()))
        .await
        .unwrap();
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(print.id, 1)]))
        .await
        .unwrap();

    state
        .accounts()
        .set_commission_rate(seller.id, Some("30".parse().unwrap()))
        .await
        .unwrap();

    let order = state
        .orders()
        .get_order(&buyer, order.id)
        .await
        .unwrap();
    assert_eq!(order.items[0].commission_amount, money("2.50"));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_quantity_above_stock_leaves_no_trace(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Textiles").await;
    let rug = product(&state, &seller, cat, "80.00", 2).await;
    let scarf = product(&state, &seller, cat, "20.00", 9).await;

    let result = state
        .orders()
        .create_order(buyer.id, cart(&[(scarf.id, 1), (rug.id, 3)]))
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Validation(_) | ServiceError::Conflict(_))
    ));

    assert_eq!(stock(&state, &seller, rug.id).await, 2);
    assert_eq!(stock(&state, &seller, scarf.id).await, 9);
    let orders = state.orders().list_orders(buyer.id, 20, 0).await.unwrap();
    assert_eq!(orders.count, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_invalid_carts_rejected(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Glass").await;
    let bowl = product(&state, &seller, cat, "15.00", 4).await;

    for bad in [
        cart(&[]),
        cart(&[(bowl.id, 0)]),
        cart(&[(bowl.id, -1)]),
        cart(&[(bowl.id, 1), (bowl.id, 1)]),
        cart(&[(9_999.into(), 1)]),
    ] {
        let result = state.orders().create_order(buyer.id, bad).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    let mut negative_shipping = cart(&[(bowl.id, 1)]);
    negative_shipping.shipping_cost = dec("-1.00");
    let result = state.orders().create_order(buyer.id, negative_shipping).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_last_unit_sold_once(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let other = customer(&state, "other@atelier.test").await;
    let cat = category(&state, "Sculpture").await;
    let bust = product(&state, &seller, cat, "300.00", 1).await;

    let orders = state.orders();
    let (first, second) = tokio::join!(
        orders.create_order(buyer.id, cart(&[(bust.id, 1)])),
        orders.create_order(other.id, cart(&[(bust.id, 1)])),
    );
    assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    assert_eq!(stock(&state, &seller, bust.id).await, 0);
}

// ============================================================================
// Status transitions
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_status_moves_forward_one_step(pool: PgPool) {
    let Market {
        state,
        admin,
        seller,
        buyer,
    } = market(pool).await;
    let cat = category(&state, "Jewelry").await;
    let ring = product(&state, &seller, cat, "60.00", 3).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(ring.id, 1)]))
        .await
        .unwrap();

    let skip = state
        .orders()
        .update_status(StatusActor::Staff(admin.id), order.id, OrderStatus::Delivered)
        .await;
    assert!(matches!(skip, Err(ServiceError::InvalidState(_))));

    let stranger = customer(&state, "stranger@atelier.test").await;
    let foreign = state
        .orders()
        .update_status(
            StatusActor::Seller(stranger.id),
            order.id,
            OrderStatus::Processing,
        )
        .await;
    assert!(matches!(foreign, Err(ServiceError::NotFound(_))));

    let order = state
        .orders()
        .update_status(StatusActor::Seller(seller.id), order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);

    let back = state
        .orders()
        .update_status(StatusActor::Staff(admin.id), order.id, OrderStatus::Pending)
        .await;
    assert!(matches!(back, Err(ServiceError::InvalidState(_))));

    let inbox = state
        .notifications()
        .list(buyer.id, None, None, 20, 0)
        .await
        .unwrap();
    assert_eq!(inbox.page.count, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_totals_beyond_money_bound_rejected(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Sculpture").await;

    let overpriced = state
        .catalog()
        .create_product(
            seller.id,
            ProductInput {
                category_id: cat,
                name: "Monument".to_owned(),
                description: String::new(),
                price: dec("10000000000.00"),
                stock: 1,
                is_active: true,
            },
        )
        .await;
    assert!(matches!(overpriced, Err(ServiceError::Validation(_))));

    let statue = product(&state, &seller, cat, "9999999999.00", 5).await;
    let result = state
        .orders()
        .create_order(buyer.id, cart(&[(statue.id, 2)]))
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(stock(&state, &seller, statue.id).await, 5);

    let bust = product(&state, &seller, cat, "9999999999.00", 5).await;
    let mut new = cart(&[(bust.id, 1)]);
    new.shipping_cost = dec("1.00");
    let result = state.orders().create_order(buyer.id, new).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(stock(&state, &seller, bust.id).await, 5);
}

// ============================================================================
// Cancellation
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_pending_restores_stock(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let mug = product(&state, &seller, cat, "25.00", 4).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(mug.id, 3)]))
        .await
        .unwrap();
    assert_eq!(stock(&state, &seller, mug.id).await, 1);

    let other = customer(&state, "other@atelier.test").await;
    let foreign = state.orders().cancel_order(other.id, order.id).await;
    assert!(matches!(foreign, Err(ServiceError::NotFound(_))));

    let cancelled = state.orders().cancel_order(buyer.id, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock(&state, &seller, mug.id).await, 4);

    let twice = state.orders().cancel_order(buyer.id, order.id).await;
    assert!(matches!(twice, Err(ServiceError::InvalidState(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_restock_saturates_at_column_max(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Prints").await;
    let print = product(&state, &seller, cat, "15.00", 2).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(print.id, 1)]))
        .await
        .unwrap();

    state
        .catalog()
        .update_product(
            seller.id,
            print.id,
            ProductInput {
                category_id: cat,
                name: print.name.clone(),
                description: String::new(),
                price: dec("15.00"),
                stock: i64::from(i32::MAX),
                is_active: true,
            },
        )
        .await
        .unwrap();

    let cancelled = state.orders().cancel_order(buyer.id, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        stock(&state, &seller, print.id).await,
        u32::try_from(i32::MAX).unwrap()
    );
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_shipped_rejected(pool: PgPool) {
    let Market {
        state,
        admin,
        seller,
        buyer,
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let plate = product(&state, &seller, cat, "18.00", 2).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(plate.id, 1)]))
        .await
        .unwrap();
    for next in [OrderStatus::Processing, OrderStatus::Shipped] {
        state
            .orders()
            .update_status(StatusActor::Staff(admin.id), order.id, next)
            .await
            .unwrap();
    }

    let result = state.orders().cancel_order(buyer.id, order.id).await;
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    assert_eq!(stock(&state, &seller, plate.id).await, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_wallet_payment_and_refund(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Paintings").await;
    let canvas = product(&state, &seller, cat, "120.00", 1).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(canvas.id, 1)]))
        .await
        .unwrap();

    let short = state.orders().pay_with_wallet(buyer.id, order.id).await;
    assert!(matches!(short, Err(ServiceError::InsufficientFunds { .. })));

    state
        .wallet()
        .deposit(buyer.id, dec("150.00"), None, "Top up")
        .await
        .unwrap();
    let paid = state
        .orders()
        .pay_with_wallet(buyer.id, order.id)
        .await
        .unwrap();
    assert!(paid.payment_status);
    assert_eq!(
        state.wallet().get_wallet(buyer.id).await.unwrap().balance,
        money("30.00")
    );

    let again = state.orders().pay_with_wallet(buyer.id, order.id).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));

    state.orders().cancel_order(buyer.id, order.id).await.unwrap();
    let wallet = state.wallet().get_wallet(buyer.id).await.unwrap();
    assert_eq!(wallet.balance, money("150.00"));
    assert!(state.wallet().audit_wallet(wallet.id).await.unwrap().is_consistent());

    let settle = state.wallet().settle_order(order.id).await;
    assert!(matches!(settle, Err(ServiceError::InvalidState(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_settled_order_cannot_be_cancelled(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let jug = product(&state, &seller, cat, "40.00", 2).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(jug.id, 1)]))
        .await
        .unwrap();

    let unpaid = state.wallet().settle_order(order.id).await;
    assert!(matches!(unpaid, Err(ServiceError::InvalidState(_))));

    state
        .orders()
        .confirm_payment(order.id, "psp-17")
        .await
        .unwrap();
    state.wallet().settle_order(order.id).await.unwrap();

    let result = state.orders().cancel_order(buyer.id, order.id).await;
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));
}

// ============================================================================
// Multi-seller orders
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_multi_seller_settlement_and_visibility(pool: PgPool) {
    let Market {
        state,
        admin,
        seller,
        buyer,
    } = market(pool).await;
    let store = onboard(&state, &admin, "gallery@atelier.test", UserRole::Store).await;
    state
        .accounts()
        .set_commission_rate(store.id, Some("0".parse().unwrap()))
        .await
        .unwrap();

    let cat = category(&state, "Mixed").await;
    let bowl = product(&state, &seller, cat, "30.00", 5).await;
    let frame = product(&state, &store, cat, "70.00", 5).await;

    let mut new = cart(&[(bowl.id, 1), (frame.id, 2)]);
    new.shipping_cost = dec("9.99");
    let order = state.orders().create_order(buyer.id, new).await.unwrap();
    assert_eq!(order.total_amount, money("179.99"));

    let seen_by_store = state.orders().get_order(&store, order.id).await.unwrap();
    assert_eq!(seen_by_store.items.len(), 1);
    assert_eq!(seen_by_store.items[0].seller_id, store.id);

    let listed = state
        .orders()
        .list_seller_orders(seller.id, None, 20, 0)
        .await
        .unwrap();
    assert_eq!(listed.count, 1);
    assert!(listed.results[0].items.iter().all(|i| i.seller_id == seller.id));

    state
        .orders()
        .confirm_payment(order.id, "psp-99")
        .await
        .unwrap();
    let settlement = state.wallet().settle_order(order.id).await.unwrap();
    assert_eq!(settlement.commission, money("3.00"));
    assert_eq!(settlement.seller_credits[&seller.id], money("27.00"));
    assert_eq!(settlement.seller_credits[&store.id], money("140.00"));

    let seller_inbox = state
        .notifications()
        .list(store.id, None, None, 20, 0)
        .await
        .unwrap();
    assert!(seller_inbox.page.count >= 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_settlement_rows_keep_posting_order(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let cup = product(&state, &seller, cat, "10.00", 5).await;
    let saucer = product(&state, &seller, cat, "20.00", 5).await;
    let teapot = product(&state, &seller, cat, "30.00", 5).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(cup.id, 1), (saucer.id, 1), (teapot.id, 1)]))
        .await
        .unwrap();
    state
        .orders()
        .confirm_payment(order.id, "psp-61")
        .await
        .unwrap();
    state.wallet().settle_order(order.id).await.unwrap();

    let rows: Vec<(i32, TransactionKind, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, kind, created_at FROM wallet_transactions
         WHERE reference_id = $1 ORDER BY id",
    )
    .bind(order.ledger_reference())
    .fetch_all(state.pool())
    .await
    .unwrap();
    let commissions = rows
        .iter()
        .filter(|(_, kind, _)| *kind == TransactionKind::Commission)
        .count();
    assert_eq!(commissions, 3);
    assert_eq!(rows.len(), 6);
    for pair in rows.windows(2) {
        assert!(pair[0].2 < pair[1].2, "{pair:?}");
    }
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_settlement_leaves_no_trace(pool: PgPool) {
    let Market {
        state,
        seller,
        buyer,
        ..
    } = market(pool).await;
    let cat = category(&state, "Ceramics").await;
    let vase = product(&state, &seller, cat, "100.00", 5).await;
    let order = state
        .orders()
        .create_order(buyer.id, cart(&[(vase.id, 1)]))
        .await
        .unwrap();
    state
        .orders()
        .confirm_payment(order.id, "psp-404")
        .await
        .unwrap();

    // Fail the seller credit, which posts after the platform commission
    sqlx::query(
        "CREATE FUNCTION reject_seller_credit() RETURNS trigger AS $$
         BEGIN
             RAISE EXCEPTION 'seller credit refused';
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(state.pool())
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_seller_credit
             BEFORE INSERT ON wallet_transactions
             FOR EACH ROW
             WHEN (NEW.kind = 'payment' AND NEW.direction = 'credit')
             EXECUTE FUNCTION reject_seller_credit()",
    )
    .execute(state.pool())
    .await
    .unwrap();

    let failed = state.wallet().settle_order(order.id).await;
    assert!(matches!(failed, Err(ServiceError::Repository(_))));

    let posted: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM wallet_transactions WHERE reference_id = $1")
            .bind(order.ledger_reference())
            .fetch_one(state.pool())
            .await
            .unwrap();
    assert_eq!(posted, 0);
    let platform = WalletRepository::new(state.pool())
        .get_platform()
        .await
        .unwrap()
        .map_or(Money::ZERO, |w| w.balance);
    assert!(platform.is_zero());
    assert!(
        state
            .wallet()
            .get_wallet(seller.id)
            .await
            .unwrap()
            .balance
            .is_zero()
    );
    let reloaded = state.orders().get_order(&buyer, order.id).await.unwrap();
    assert!(reloaded.settled_at.is_none());

    sqlx::query("DROP TRIGGER reject_seller_credit ON wallet_transactions")
        .execute(state.pool())
        .await
        .unwrap();
    let settlement = state.wallet().settle_order(order.id).await.unwrap();
    assert_eq!(settlement.commission, money("10.00"));
    assert_eq!(
        state.wallet().get_wallet(seller.id).await.unwrap().balance,
        money("90.00")
    );
}
