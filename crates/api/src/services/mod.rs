//! Business logic services.
//!
//! Each service owns a pool handle and runs its operations as short
//! database transactions. Notifications go out after commit.
//!
//! # Services
//!
//! - `accounts` - Registration, profiles, blocking and API tokens
//! - `onboarding` - Seller applications and admin decisions
//! - `activity` - The admin activity log
//! - `catalog` - Products, categories and reviews
//! - `cart` - The per-user shopping cart
//! - `wallet` - Wallet ledger, deposits, withdrawals and settlement
//! - `orders` - Checkout, cancellation, status and payment
//! - `notifications` - Domain events and the notification inbox

pub mod accounts;
pub mod activity;
pub mod cart;
pub mod catalog;
pub mod notifications;
pub mod onboarding;
pub mod orders;
pub mod wallet;

use thiserror::Error;

use atelier_core::{
    CommissionRateError, EmailError, LedgerError, Money, MoneyError, ProfileError, QuantityError,
    RatingError, TransitionError,
};

use crate::db::RepositoryError;

pub use accounts::{AccountService, IssuedToken, hash_token};
pub use activity::ActivityService;
pub use cart::CartService;
pub use catalog::{CatalogService, ProductInput, ReviewInput, ReviewList};
pub use notifications::{DomainEvent, NotificationDispatcher, NotificationList, NotificationService};
pub use onboarding::OnboardingService;
pub use orders::{CartCheckout, CartItem, NewOrder, OrderService, StatusActor};
pub use wallet::{Settlement, WalletAudit, WalletService};

/// Errors raised by service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input was rejected before touching any state.
    #[error("validation error: {0}")]
    Validation(String),

    /// The target does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current state (duplicates, races).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A debit exceeds the wallet balance.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Money, requested: Money },

    /// The entity is not in a state that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Database failure.
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl ServiceError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Convert a repository error, naming the entity on `NotFound`.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(RepositoryError) -> ServiceError {
    move |err| match err {
        RepositoryError::NotFound => ServiceError::NotFound(what.to_owned()),
        other => other.into(),
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound => Self::NotFound("record".to_owned()),
            other => Self::Repository(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, requested } => {
                Self::InsufficientFunds { balance, requested }
            }
            LedgerError::Amount(e) => Self::Validation(e.to_string()),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

macro_rules! validation_from {
    ($($err:ty),+ $(,)?) => {
        $(
            impl From<$err> for ServiceError {
                fn from(err: $err) -> Self {
                    Self::Validation(err.to_string())
                }
            }
        )+
    };
}

validation_from!(
    EmailError,
    MoneyError,
    ProfileError,
    CommissionRateError,
    QuantityError,
    RatingError
);
