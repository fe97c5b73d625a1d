//! User and profile repository.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use atelier_core::{CommissionRate, Email, RoleProfile, UserId, UserRole};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Profile, User};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    is_staff: bool,
    is_blocked: bool,
    blocked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?;
        Ok(Self {
            id: row.id,
            email,
            is_staff: row.is_staff,
            is_blocked: row.is_blocked,
            blocked_reason: row.blocked_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: UserId,
    role: UserRole,
    details: Json<RoleProfile>,
    is_verified: bool,
    commission_rate: Option<CommissionRate>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let details = row.details.0;
        if details.role() != row.role {
            return Err(RepositoryError::DataCorruption(format!(
                "profile {} has role '{}' but details for '{}'",
                row.user_id,
                row.role,
                details.role()
            )));
        }
        Ok(Self {
            user_id: row.user_id,
            details,
            is_verified: row.is_verified,
            commission_rate: row.commission_rate,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, is_staff, is_blocked, blocked_reason, created_at, updated_at";
const PROFILE_COLUMNS: &str = "user_id, role, details, is_verified, commission_rate, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for user and profile database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user together with an empty customer profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, email: &Email, is_staff: bool) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, is_staff) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(is_staff)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "email already exists"))?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Grant or revoke staff access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_staff(&self, id: UserId, is_staff: bool) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_staff = $2, updated_at = NOW() WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_staff)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored details do not
    /// match the stored role.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Replace a profile's details without changing its role.
    ///
    /// Returns `None` when no profile with the details' role exists for the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_details(
        &self,
        user_id: UserId,
        details: &RoleProfile,
    ) -> Result<Option<Profile>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE user_profiles SET details = $2, updated_at = NOW()
             WHERE user_id = $1 AND role = $3
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(Json(details))
        .bind(details.role())
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Set or clear a seller's explicit commission rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_commission_rate(
        &self,
        user_id: UserId,
        rate: Option<CommissionRate>,
    ) -> Result<Profile, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE user_profiles SET commission_rate = $2, updated_at = NOW()
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(rate)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Block or unblock a user. Unblocking clears the reason.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
pub async fn set_blocked(
    conn: &mut PgConnection,
    id: UserId,
    blocked: bool,
    reason: Option<&str>,
) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users
         SET is_blocked = $2,
             blocked_reason = CASE WHEN $2 THEN $3 ELSE NULL END,
             updated_at = NOW()
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(blocked)
    .bind(reason)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}

/// Lock a profile row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_profile(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Profile>, RepositoryError> {
    sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .map(TryInto::try_into)
    .transpose()
}

/// Fetch the profiles of several users.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn profiles_for(
    conn: &mut PgConnection,
    user_ids: &[UserId],
) -> Result<Vec<Profile>, RepositoryError> {
    let ids: Vec<i32> = user_ids.iter().map(UserId::as_i32).collect();
    sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(TryInto::try_into)
    .collect()
}

/// Switch a profile to the role of `details` and mark it verified.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the profile does not exist.
pub async fn assign_role(
    conn: &mut PgConnection,
    user_id: UserId,
    details: &RoleProfile,
) -> Result<Profile, RepositoryError> {
    sqlx::query_as::<_, ProfileRow>(&format!(
        "UPDATE user_profiles
         SET role = $2, details = $3, is_verified = TRUE, updated_at = NOW()
         WHERE user_id = $1
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(details.role())
    .bind(Json(details))
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}
