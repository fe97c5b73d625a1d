//! Bearer token extractors.
//!
//! Clients send `Authorization: Bearer <token>`. The token is hashed and
//! looked up in `api_tokens`; revoked tokens and blocked users are rejected.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

/// Extractor that requires an authenticated, unblocked user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub User);

/// Extractor that requires a staff user.
pub struct RequireStaff(pub User);

/// Extractor that authenticates when a token is present.
///
/// A missing header yields `None`; a bad token is still rejected.
pub struct OptionalUser(pub Option<User>);

/// Error returned when authentication fails.
#[derive(Debug)]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header.
    MissingToken,
    /// Unknown or revoked token.
    InvalidToken,
    /// The account is blocked.
    Blocked,
    /// Staff access required.
    NotStaff,
    /// Token lookup failed.
    Lookup(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingToken => AppError::Unauthorized("missing bearer token".into()),
            Self::InvalidToken => AppError::Unauthorized("invalid or revoked token".into()),
            Self::Blocked => AppError::Forbidden("account is blocked".into()),
            Self::NotStaff => AppError::Forbidden("staff access required".into()),
            Self::Lookup(err) => err,
        }
        .into_response()
    }
}

/// The bearer token from the request headers, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, AuthRejection> {
    let user = state
        .accounts()
        .authenticate(token)
        .await
        .map_err(|e| AuthRejection::Lookup(e.into()))?
        .ok_or(AuthRejection::InvalidToken)?;

    if user.is_blocked {
        return Err(AuthRejection::Blocked);
    }

    Span::current().record("user_id", user.id.as_i32());
    set_sentry_user(user.id, user.email.as_str());
    Ok(user)
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;
        Ok(Self(authenticate(state, token).await?))
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AuthRejection::NotStaff);
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(Self(Some(authenticate(state, token).await?))),
            None => Ok(Self(None)),
        }
    }
}
