//! The caller's wallet and ledger history.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use atelier_core::{Page, PageRequest, TransactionKind};

use crate::db::wallets::TransactionFilter;
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{Wallet, WalletTransaction};
use crate::state::AppState;

/// Filters for the transaction history.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<TransactionQuery> for TransactionFilter {
    fn from(q: TransactionQuery) -> Self {
        Self {
            kind: q.kind,
            from: q.from,
            to: q.to,
        }
    }
}

/// GET /api/wallet
///
/// # Errors
///
/// Returns 500 if the wallet cannot be loaded.
pub async fn get_wallet(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Wallet>, AppError> {
    Ok(Json(state.wallet().get_wallet(user.id).await?))
}

/// GET /api/wallet/transactions
///
/// # Errors
///
/// Returns 400 if `from` is not before `to`.
pub async fn list_transactions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<TransactionQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<WalletTransaction>>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .wallet()
            .list_transactions(user.id, query.into(), limit, offset)
            .await?,
    ))
}
