//! Registration and the caller's own profile.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use atelier_core::RoleProfile;

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{Profile, User};
use crate::state::AppState;

/// Label given to the token issued at registration.
const REGISTRATION_TOKEN_LABEL: &str = "registration";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

/// A new account plus its first bearer token, shown once.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub token: String,
}

/// Register a customer account.
///
/// POST /api/users
///
/// # Errors
///
/// Returns 400 for a malformed email and 409 if it is already registered.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = state.accounts().register_user(&req.email).await?;
    let issued = state
        .accounts()
        .issue_token(user.id, REGISTRATION_TOKEN_LABEL)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            token: issued.secret,
        }),
    ))
}

/// GET /api/me/profile
///
/// # Errors
///
/// Returns 404 if the profile is missing.
pub async fn get_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.accounts().get_profile(user.id).await?))
}

/// Replace the role-specific profile details.
///
/// PUT /api/me/profile
///
/// # Errors
///
/// Returns 400 if the details are invalid or tagged with another role.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(details): Json<RoleProfile>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(
        state.accounts().update_profile(user.id, details).await?,
    ))
}
