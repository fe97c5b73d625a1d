//! Staff-only endpoints.
//!
//! Every handler takes [`RequireStaff`], so non-staff callers get 403 before
//! any service runs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use atelier_core::{
    AdminAction, ApplicationId, ApplicationStatus, CategoryId, CommissionRate, Decision, OrderId,
    Page, PageRequest, UserId,
};

use crate::db::activities::ActivityFilter;
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::{
    AdminActivity, Category, Order, Profile, SellerApplication, User, WalletTransaction,
};
use crate::routes::orders::StatusUpdate;
use crate::services::{Settlement, StatusActor, WalletAudit};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    /// Caller-chosen key; retrying with the same key posts once.
    #[serde(default)]
    pub reference_id: Option<String>,
}

impl AmountRequest {
    fn description_or(&self, default: &'static str) -> String {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(default)
            .to_owned()
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub reference_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub admin_id: Option<UserId>,
    pub action: Option<AdminAction>,
}

impl From<ActivityQuery> for ActivityFilter {
    fn from(q: ActivityQuery) -> Self {
        Self {
            admin_id: q.admin_id,
            action: q.action,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommissionRateRequest {
    /// `null` clears the seller's rate so the default applies.
    pub rate: Option<CommissionRate>,
}

// =============================================================================
// Seller applications
// =============================================================================

/// GET /api/admin/seller-applications
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_applications(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<ApplicationQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<SellerApplication>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .onboarding()
            .list_applications(query.status, limit, offset)
            .await?,
    ))
}

/// GET /api/admin/seller-applications/{id}
///
/// # Errors
///
/// Returns 404 if the application does not exist.
pub async fn get_application(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ApplicationId>,
) -> Result<Json<SellerApplication>, AppError> {
    Ok(Json(state.onboarding().get_application(id).await?))
}

/// POST /api/admin/seller-applications/{id}/decision
///
/// # Errors
///
/// Returns 404 if the application does not exist and 409 if it was already
/// decided.
pub async fn decide_application(
    State(state): State<AppState>,
    RequireStaff(admin): RequireStaff,
    Path(id): Path<ApplicationId>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<SellerApplication>, AppError> {
    Ok(Json(
        state
            .onboarding()
            .decide_application(admin.id, id, req.decision, req.notes)
            .await?,
    ))
}

// =============================================================================
// Wallets
// =============================================================================

/// POST /api/admin/wallets/{user_id}/deposit
///
/// # Errors
///
/// Returns 400 unless the amount is positive, 404 if the user does not
/// exist and 409 if `reference_id` was used for a different amount.
pub async fn deposit(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(user_id): Path<UserId>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    let description = req.description_or("Deposit");
    let txn = state
        .wallet()
        .deposit(user_id, req.amount, req.reference_id.as_deref(), &description)
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

/// POST /api/admin/wallets/{user_id}/withdraw
///
/// # Errors
///
/// Returns 422 if the amount exceeds the balance and 409 if `reference_id`
/// was used for a different amount.
pub async fn withdraw(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(user_id): Path<UserId>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    let description = req.description_or("Withdrawal");
    let txn = state
        .wallet()
        .withdraw(user_id, req.amount, req.reference_id.as_deref(), &description)
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

/// Recompute every wallet balance from its ledger.
///
/// GET /api/admin/wallets/audit
///
/// # Errors
///
/// Returns 500 if a query fails.
pub async fn audit_wallets(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<WalletAudit>>, AppError> {
    Ok(Json(state.wallet().audit_all().await?))
}

// =============================================================================
// Orders
// =============================================================================

/// Record an external payment.
///
/// POST /api/admin/orders/{id}/payment
///
/// # Errors
///
/// Returns 409 if the order is already paid or was cancelled.
pub async fn confirm_payment(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        state
            .orders()
            .confirm_payment(id, &req.reference_id)
            .await?,
    ))
}

/// POST /api/admin/orders/{id}/settle
///
/// # Errors
///
/// Returns 409 if the order is unpaid, cancelled or already settled.
pub async fn settle_order(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<Settlement>, AppError> {
    Ok(Json(state.wallet().settle_order(id).await?))
}

/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// Returns 409 for anything but the next forward step.
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireStaff(admin): RequireStaff,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        state
            .orders()
            .update_status(StatusActor::Staff(admin.id), id, update.status)
            .await?,
    ))
}

// =============================================================================
// Catalog and users
// =============================================================================

/// POST /api/admin/categories
///
/// # Errors
///
/// Returns 400 for a blank name or unknown parent and 409 if the name is
/// taken.
pub async fn create_category(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state
        .catalog()
        .create_category(&req.name, req.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/users/{id}/block
///
/// # Errors
///
/// Returns 400 if staff target themselves and 404 if the user does not exist.
pub async fn set_blocked(
    State(state): State<AppState>,
    RequireStaff(admin): RequireStaff,
    Path(user_id): Path<UserId>,
    Json(req): Json<BlockRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state
            .accounts()
            .set_blocked(admin.id, user_id, req.blocked, req.reason.as_deref())
            .await?,
    ))
}

/// PUT /api/admin/users/{id}/commission-rate
///
/// # Errors
///
/// Returns 400 if the rate is outside 0 to 100 or the user is not a seller.
pub async fn set_commission_rate(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(user_id): Path<UserId>,
    Json(req): Json<CommissionRateRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(
        state
            .accounts()
            .set_commission_rate(user_id, req.rate)
            .await?,
    ))
}

/// Newest first.
///
/// GET /api/admin/activity
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_activity(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<ActivityQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<AdminActivity>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .activity()
            .list(query.into(), limit, offset)
            .await?,
    ))
}
