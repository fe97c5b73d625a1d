//! Database operations for the marketplace `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users`, `user_profiles` - Accounts and role-tagged profiles
//! - `api_tokens` - Hashed bearer tokens
//! - `seller_applications` - Seller onboarding requests
//! - `categories`, `products` - Catalog
//! - `orders`, `order_items` - Purchases with frozen prices and commission
//! - `wallets`, `wallet_transactions` - Balances and the append-only ledger
//! - `notifications` - Stored user notifications
//! - `carts`, `cart_items` - One shopping cart per user
//! - `product_reviews` - Star ratings, one per buyer and product
//! - `admin_activities` - Audit trail of staff actions
//!
//! # Conventions
//!
//! Repository structs borrow the pool for standalone reads and writes.
//! Steps that must run inside a caller's transaction are free functions
//! taking `&mut PgConnection`; those that lock rows use `SELECT ... FOR UPDATE`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p atelier-cli -- migrate
//! ```

pub mod activities;
pub mod applications;
pub mod carts;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod tokens;
pub mod users;
pub mod wallets;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use activities::ActivityRepository;
pub use applications::ApplicationRepository;
pub use carts::CartRepository;
pub use catalog::{CategoryRepository, ProductRepository};
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;
pub use wallets::WalletRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub(crate) fn corrupt(what: &str, err: impl std::fmt::Display) -> Self {
        Self::DataCorruption(format!("invalid {what} in database: {err}"))
    }
}

/// Map unique violations to [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
