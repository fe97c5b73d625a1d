//! Domain models for the marketplace API.
//!
//! These are validated domain objects produced by the repositories in
//! [`crate::db`]. Database row types stay private to the repositories.

pub mod activity;
pub mod application;
pub mod cart;
pub mod catalog;
pub mod notification;
pub mod order;
pub mod user;
pub mod wallet;

pub use activity::AdminActivity;
pub use application::{ApplicationPayload, SellerApplication};
pub use cart::{Cart, CartLine};
pub use catalog::{Category, Product, Review};
pub use notification::{Notification, RelatedObject};
pub use order::{Order, OrderItem};
pub use user::{ApiToken, Profile, User};
pub use wallet::{Wallet, WalletOwner, WalletTransaction};
