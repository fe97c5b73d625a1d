//! Notification inbox.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use atelier_core::{NotificationId, NotificationKind, PageRequest};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::services::NotificationList;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub is_read: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/notifications
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<NotificationQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<NotificationList>, AppError> {
    let (limit, offset) = state.page_bounds(&page);
    Ok(Json(
        state
            .notifications()
            .list(user.id, query.kind, query.is_read, limit, offset)
            .await?,
    ))
}

/// PUT /api/notifications/{id}/read
///
/// # Errors
///
/// Returns 404 if the caller has no such notification.
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, AppError> {
    state.notifications().mark_read(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/notifications/read-all
///
/// # Errors
///
/// Returns 500 if the update fails.
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.notifications().mark_all_read(user.id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
