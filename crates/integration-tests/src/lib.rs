//! Integration tests for Atelier.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and point DATABASE_URL at it
//! docker compose up -d db
//!
//! # Run the database-backed tests
//! cargo test -p atelier-integration-tests -- --ignored
//! ```
//!
//! Each test gets a fresh database from `#[sqlx::test]`, migrated from
//! `crates/api/migrations/`.
//!
//! # Test Categories
//!
//! - `onboarding` - Seller applications and decisions
//! - `wallet_ledger` - Deposits, withdrawals and balance invariants
//! - `orders` - Checkout, commission, cancellation and settlement
//! - `cart_reviews` - Cart lines, cart checkout and product reviews
//! - `http_api` - The router end to end via `tower::ServiceExt::oneshot`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use atelier_api::config::ApiConfig;
use atelier_api::models::{ApplicationPayload, Product, User};
use atelier_api::services::{CartItem, NewOrder, ProductInput};
use atelier_api::state::AppState;
use atelier_core::{
    ArtistDetails, CategoryId, Decision, ProductId, RoleProfile, StoreDetails, UserRole,
};

/// Build application state over a test pool with default settings.
#[must_use]
pub fn state(pool: PgPool) -> AppState {
    let config = ApiConfig::from_lookup(|key| {
        (key == "ATELIER_DATABASE_URL").then(|| "postgres://unused-in-tests".to_owned())
    })
    .unwrap();
    AppState::new(config, pool)
}

/// Parse a decimal literal such as `"100.00"`.
#[must_use]
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Register a customer.
pub async fn customer(state: &AppState, email: &str) -> User {
    state.accounts().register_user(email).await.unwrap()
}

/// Create a staff account.
pub async fn staff(state: &AppState, email: &str) -> User {
    state.accounts().create_user(email, true).await.unwrap()
}

/// Application payload for the given seller role.
#[must_use]
pub fn payload(role: UserRole) -> ApplicationPayload {
    let details = match role {
        UserRole::Store => RoleProfile::Store(StoreDetails {
            store_name: "Corner Gallery".to_owned(),
            tax_id: Some("TX-1001".to_owned()),
            has_physical_store: false,
            physical_address: None,
        }),
        _ => RoleProfile::Artist(ArtistDetails {
            specialty: Some("ceramics".to_owned()),
            bio: None,
        }),
    };
    ApplicationPayload {
        details,
        phone_number: None,
        address: None,
        social_media: None,
        portfolio_link: Some("https://portfolio.example/mira".to_owned()),
        category_ids: Vec::new(),
        shipping_costs: BTreeMap::new(),
        documents: Vec::new(),
        terms_accepted: true,
    }
}

/// Register a user and take them through onboarding to an approved seller.
pub async fn seller(state: &AppState, admin: &User, email: &str, role: UserRole) -> User {
    let user = customer(state, email).await;
    let application = state
        .onboarding()
        .submit_application(user.id, role, payload(role))
        .await
        .unwrap();
    state
        .onboarding()
        .decide_application(admin.id, application.id, Decision::Approved, None)
        .await
        .unwrap();
    user
}

/// Create an active category.
pub async fn category(state: &AppState, name: &str) -> CategoryId {
    state
        .catalog()
        .create_category(name, None)
        .await
        .unwrap()
        .id
}

/// List a product for a seller.
pub async fn product(
    state: &AppState,
    seller: &User,
    category_id: CategoryId,
    price: &str,
    stock: i64,
) -> Product {
    state
        .catalog()
        .create_product(
            seller.id,
            ProductInput {
                category_id,
                name: format!("Piece at {price}"),
                description: String::new(),
                price: dec(price),
                stock,
                is_active: true,
            },
        )
        .await
        .unwrap()
}

/// Checkout request for the given lines with free shipping.
#[must_use]
pub fn cart(lines: &[(ProductId, i64)]) -> NewOrder {
    NewOrder {
        items: lines
            .iter()
            .map(|&(product_id, quantity)| CartItem {
                product_id,
                quantity,
            })
            .collect(),
        shipping_address: "12 Harbour Road, Porto".to_owned(),
        shipping_cost: Decimal::ZERO,
    }
}

/// Current stock of a product.
pub async fn stock(state: &AppState, seller: &User, id: ProductId) -> u32 {
    state
        .catalog()
        .get_product(id, Some(seller.id))
        .await
        .unwrap()
        .stock
}
