//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Liveness check
//! GET  /health/ready                             - Readiness check (database)
//!
//! # Accounts
//! POST /api/users                                - Register, returns a bearer token
//! GET  /api/me/profile                           - Caller's profile
//! PUT  /api/me/profile                           - Update role-specific details
//!
//! # Seller onboarding
//! POST /api/seller-applications                  - Submit an application
//! GET  /api/seller-applications/status           - Latest application status
//!
//! # Catalog
//! GET  /api/products                             - Browse products
//! POST /api/products                             - List a product (sellers)
//! GET  /api/products/{id}                        - Product detail
//! PUT  /api/products/{id}                        - Update own product
//! DELETE /api/products/{id}                      - Delete or deactivate own product
//! GET  /api/products/{id}/reviews                - Reviews with average rating
//! POST /api/products/{id}/reviews                - Review a product once
//! GET  /api/categories                           - Active categories
//!
//! # Cart
//! GET  /api/cart                                 - Caller's cart with totals
//! DELETE /api/cart                               - Empty the cart
//! POST /api/cart/items                           - Add a product
//! PUT  /api/cart/items/{product_id}              - Set a line's quantity
//! DELETE /api/cart/items/{product_id}            - Remove a line
//! POST /api/cart/checkout                        - Order the cart and empty it
//!
//! # Orders
//! POST /api/orders                               - Checkout
//! GET  /api/orders                               - Caller's orders
//! GET  /api/orders/{id}                          - Order detail
//! POST /api/orders/{id}/cancel                   - Cancel (pending/processing)
//! POST /api/orders/{id}/pay                      - Pay from wallet
//! GET  /api/seller/orders                        - Orders with the caller's items
//! PUT  /api/seller/orders/{id}/status            - Advance fulfilment
//!
//! # Wallet
//! GET  /api/wallet                               - Balance
//! GET  /api/wallet/transactions                  - Ledger history
//!
//! # Notifications
//! GET  /api/notifications                        - Inbox with unread count
//! PUT  /api/notifications/{id}/read              - Mark one read
//! PUT  /api/notifications/read-all               - Mark all read
//!
//! # Admin (staff only)
//! GET  /api/admin/seller-applications            - Review queue
//! GET  /api/admin/seller-applications/{id}       - Application detail
//! POST /api/admin/seller-applications/{id}/decision - Approve or reject
//! POST /api/admin/wallets/{user_id}/deposit      - Credit a wallet
//! POST /api/admin/wallets/{user_id}/withdraw     - Debit a wallet
//! GET  /api/admin/wallets/audit                  - Ledger consistency report
//! POST /api/admin/orders/{id}/payment            - Record external payment
//! POST /api/admin/orders/{id}/settle             - Pay out commission and sellers
//! PUT  /api/admin/orders/{id}/status             - Advance fulfilment
//! POST /api/admin/categories                     - Add a category
//! PUT  /api/admin/users/{id}/block               - Block or unblock
//! PUT  /api/admin/users/{id}/commission-rate     - Set a seller's rate
//! GET  /api/admin/activity                       - Staff action log
//! ```

pub mod admin;
pub mod applications;
pub mod cart;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod users;
pub mod wallet;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the seller application routes router.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(applications::submit))
        .route("/status", get(applications::status))
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/{id}",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route(
            "/{id}/reviews",
            get(catalog::list_reviews).post(catalog::add_review),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::get_cart).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route("/checkout", post(cart::checkout))
}

/// Create the buyer order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list_orders).post(orders::create_order))
        .route("/{id}", get(orders::get_order))
        .route("/{id}/cancel", post(orders::cancel_order))
        .route("/{id}/pay", post(orders::pay_order))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/read-all", put(notifications::mark_all_read))
        .route("/{id}/read", put(notifications::mark_read))
}

/// Create the staff routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/seller-applications", get(admin::list_applications))
        .route("/seller-applications/{id}", get(admin::get_application))
        .route(
            "/seller-applications/{id}/decision",
            post(admin::decide_application),
        )
        .route("/wallets/audit", get(admin::audit_wallets))
        .route("/wallets/{user_id}/deposit", post(admin::deposit))
        .route("/wallets/{user_id}/withdraw", post(admin::withdraw))
        .route("/orders/{id}/payment", post(admin::confirm_payment))
        .route("/orders/{id}/settle", post(admin::settle_order))
        .route("/orders/{id}/status", put(admin::update_order_status))
        .route("/categories", post(admin::create_category))
        .route("/users/{id}/block", put(admin::set_blocked))
        .route(
            "/users/{id}/commission-rate",
            put(admin::set_commission_rate),
        )
        .route("/activity", get(admin::list_activity))
}

/// Create all `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::register))
        .route(
            "/me/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .nest("/seller-applications", application_routes())
        .nest("/products", product_routes())
        .route("/categories", get(catalog::list_categories))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/seller/orders", get(orders::list_seller_orders))
        .route(
            "/seller/orders/{id}/status",
            put(orders::update_seller_order_status),
        )
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .nest("/notifications", notification_routes())
        .nest("/admin", admin_routes())
}

/// Create all routes, including health checks.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
