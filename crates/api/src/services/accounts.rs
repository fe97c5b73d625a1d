//! Accounts: registration, profiles, blocking and API tokens.

use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, instrument};

use atelier_core::{AdminAction, ApiTokenId, CommissionRate, Email, RoleProfile, UserId};

use super::{ServiceError, missing};
use crate::db::{TokenRepository, UserRepository, activities, users};
use crate::models::{ApiToken, Profile, RelatedObject, User};

/// Bytes of randomness in a bearer token.
const TOKEN_BYTES: usize = 32;

/// A freshly issued token. `secret` is shown once and never stored.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: ApiToken,
    pub secret: String,
}

/// Hex-encoded SHA-256 of a bearer token, as stored in `api_tokens`.
#[must_use]
pub fn hash_token(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn generate_secret() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Account and profile operations.
#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a customer account.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed email and
    /// `ServiceError::Conflict` if the email is taken.
    #[instrument(skip(self))]
    pub async fn register_user(&self, email: &str) -> Result<User, ServiceError> {
        self.create_user(email, false).await
    }

    /// Create an account, optionally with staff access.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_user`].
    #[instrument(skip(self))]
    pub async fn create_user(&self, email: &str, is_staff: bool) -> Result<User, ServiceError> {
        let email = Email::parse(email)?;
        let user = UserRepository::new(&self.pool)
            .create(&email, is_staff)
            .await?;
        info!(user_id = %user.id, is_staff, "Registered user");
        Ok(user)
    }

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if no account has this email.
    pub async fn find_by_email(&self, email: &str) -> Result<User, ServiceError> {
        let email = Email::parse(email)?;
        UserRepository::new(&self.pool)
            .get_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user has no profile.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Profile, ServiceError> {
        UserRepository::new(&self.pool)
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile"))
    }

    /// Replace the role-specific details of the user's own profile.
    ///
    /// Roles only change through seller onboarding, so the details must be
    /// tagged with the current role.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the details are invalid or are
    /// for a different role.
    #[instrument(skip(self, details), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        details: RoleProfile,
    ) -> Result<Profile, ServiceError> {
        let details = details.normalized()?;
        let current = self.get_profile(user_id).await?;
        details.expect_role(current.role())?;

        UserRepository::new(&self.pool)
            .update_details(user_id, &details)
            .await?
            .ok_or_else(|| ServiceError::Conflict("profile role changed during update".to_owned()))
    }

    /// Set or clear a seller's commission rate.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the user is not a seller.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_commission_rate(
        &self,
        user_id: UserId,
        rate: Option<CommissionRate>,
    ) -> Result<Profile, ServiceError> {
        let profile = self.get_profile(user_id).await?;
        profile.details.expect_seller()?;

        let profile = UserRepository::new(&self.pool)
            .set_commission_rate(user_id, rate)
            .await?;
        info!(rate = ?rate.map(CommissionRate::percent), "Set commission rate");
        Ok(profile)
    }

    /// Block or unblock a user.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if an admin targets themselves and
    /// `ServiceError::NotFound` if the user does not exist.
    #[instrument(skip(self, reason), fields(admin_id = %admin_id, user_id = %user_id))]
    pub async fn set_blocked(
        &self,
        admin_id: UserId,
        user_id: UserId,
        blocked: bool,
        reason: Option<&str>,
    ) -> Result<User, ServiceError> {
        if admin_id == user_id {
            return Err(ServiceError::validation("cannot change your own block status"));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let mut tx = self.pool.begin().await?;
        let user = users::set_blocked(&mut *tx, user_id, blocked, reason)
            .await
            .map_err(missing("user"))?;
        let (action, description) = if blocked {
            (
                AdminAction::Block,
                format!("Blocked {}: {}", user.email, reason.unwrap_or("no reason given")),
            )
        } else {
            (AdminAction::Unblock, format!("Unblocked {}", user.email))
        };
        activities::record(
            &mut *tx,
            admin_id,
            action,
            &description,
            Some(&RelatedObject::user(user_id)),
        )
        .await?;
        tx.commit().await?;

        info!(blocked, "Updated block status");
        Ok(user)
    }

    /// Grant or revoke staff access.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    pub async fn set_staff(&self, user_id: UserId, is_staff: bool) -> Result<User, ServiceError> {
        UserRepository::new(&self.pool)
            .set_staff(user_id, is_staff)
            .await
            .map_err(missing("user"))
    }

    /// Issue a new bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn issue_token(
        &self,
        user_id: UserId,
        label: &str,
    ) -> Result<IssuedToken, ServiceError> {
        let secret = generate_secret();
        let token = TokenRepository::new(&self.pool)
            .create(user_id, &hash_token(&secret), label.trim())
            .await
            .map_err(missing("user"))?;
        info!(token_id = %token.id, "Issued API token");
        Ok(IssuedToken { token, secret })
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the lookup fails.
    pub async fn authenticate(&self, secret: &str) -> Result<Option<User>, ServiceError> {
        Ok(TokenRepository::new(&self.pool)
            .authenticate(&hash_token(secret))
            .await?)
    }

    /// List a user's tokens.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_tokens(&self, user_id: UserId) -> Result<Vec<ApiToken>, ServiceError> {
        Ok(TokenRepository::new(&self.pool)
            .list_for_user(user_id)
            .await?)
    }

    /// Revoke a token.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if no active token has this ID.
    #[instrument(skip(self))]
    pub async fn revoke_token(&self, id: ApiTokenId) -> Result<(), ServiceError> {
        if TokenRepository::new(&self.pool).revoke(id).await? {
            info!(token_id = %id, "Revoked API token");
            Ok(())
        } else {
            Err(ServiceError::not_found("token"))
        }
    }
}
