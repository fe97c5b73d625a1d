//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{
    AccountService, ActivityService, CartService, CatalogService, NotificationDispatcher,
    NotificationService, OnboardingService, OrderService, WalletService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    accounts: AccountService,
    onboarding: OnboardingService,
    catalog: CatalogService,
    cart: CartService,
    wallet: WalletService,
    orders: OrderService,
    notifications: NotificationService,
    activity: ActivityService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// All services share the pool and a single notification dispatcher.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let dispatcher = NotificationDispatcher::new(pool.clone());

        Self {
            inner: Arc::new(AppStateInner {
                accounts: AccountService::new(pool.clone()),
                onboarding: OnboardingService::new(pool.clone(), dispatcher.clone()),
                catalog: CatalogService::new(pool.clone()),
                cart: CartService::new(pool.clone()),
                wallet: WalletService::new(pool.clone(), dispatcher.clone()),
                orders: OrderService::new(
                    pool.clone(),
                    config.default_commission_rate,
                    dispatcher,
                ),
                notifications: NotificationService::new(pool.clone()),
                activity: ActivityService::new(pool.clone()),
                config,
                pool,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    #[must_use]
    pub fn onboarding(&self) -> &OnboardingService {
        &self.inner.onboarding
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn wallet(&self) -> &WalletService {
        &self.inner.wallet
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationService {
        &self.inner.notifications
    }

    #[must_use]
    pub fn activity(&self) -> &ActivityService {
        &self.inner.activity
    }

    /// `(limit, offset)` for a list request, clamped to the configured maximum.
    #[must_use]
    pub fn page_bounds(&self, page: &atelier_core::PageRequest) -> (i64, i64) {
        page.bounds(self.inner.config.page_size_max)
    }
}
