//! Seller application submission and status.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use atelier_core::UserRole;

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{ApplicationPayload, SellerApplication};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitApplicationRequest {
    pub requested_role: UserRole,
    #[serde(flatten)]
    pub payload: ApplicationPayload,
}

/// The caller's latest application, or `"none"`.
#[derive(Debug, Serialize)]
pub struct ApplicationStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<SellerApplication>,
}

impl From<Option<SellerApplication>> for ApplicationStatusResponse {
    fn from(application: Option<SellerApplication>) -> Self {
        Self {
            status: application
                .as_ref()
                .map_or("none", |a| a.status.as_str()),
            application,
        }
    }
}

/// POST /api/seller-applications
///
/// # Errors
///
/// Returns 400 for a non-seller role or mismatched details, and 409 if the
/// caller already sells or has a pending application.
pub async fn submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<SellerApplication>), AppError> {
    let application = state
        .onboarding()
        .submit_application(user.id, req.requested_role, req.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/seller-applications/status
///
/// # Errors
///
/// Returns 500 if the lookup fails.
pub async fn status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApplicationStatusResponse>, AppError> {
    let latest = state.onboarding().application_status(user.id).await?;
    Ok(Json(latest.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_no_application_reports_none() {
        let json = serde_json::to_value(ApplicationStatusResponse::from(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "none" }));
    }

    #[test]
    fn test_submit_request_flattens_payload() {
        let req: SubmitApplicationRequest = serde_json::from_str(
            r#"{
                "requested_role": "artist",
                "details": {"role": "artist", "specialty": "ceramics"},
                "terms_accepted": true
            }"#,
        )
        .unwrap();
        assert_eq!(req.requested_role, UserRole::Artist);
        assert!(req.payload.terms_accepted);
        assert!(req.payload.category_ids.is_empty());
    }
}
