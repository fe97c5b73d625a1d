//! API token repository.
//!
//! Only the SHA-256 hash of a bearer token is stored; the plaintext is shown
//! once when issued.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::{ApiTokenId, UserId};

use super::RepositoryError;
use crate::models::{ApiToken, User};

#[derive(Debug, sqlx::FromRow)]
struct ApiTokenRow {
    id: ApiTokenId,
    user_id: UserId,
    label: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiTokenRow> for ApiToken {
    fn from(row: ApiTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            label: row.label,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Repository for API token database operations.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        label: &str,
    ) -> Result<ApiToken, RepositoryError> {
        let row = sqlx::query_as::<_, ApiTokenRow>(
            r"
            INSERT INTO api_tokens (user_id, token_hash, label)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, label, created_at, last_used_at, revoked_at
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(label)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Resolve an unrevoked token hash to its user, recording the use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn authenticate(&self, token_hash: &str) -> Result<Option<User>, RepositoryError> {
        let user_id: Option<UserId> = sqlx::query_scalar(
            r"
            UPDATE api_tokens SET last_used_at = NOW()
            WHERE token_hash = $1 AND revoked_at IS NULL
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        match user_id {
            Some(id) => super::UserRepository::new(self.pool).get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// List a user's tokens, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ApiToken>, RepositoryError> {
        let rows = sqlx::query_as::<_, ApiTokenRow>(
            r"
            SELECT id, user_id, label, created_at, last_used_at, revoked_at
            FROM api_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Revoke a token.
    ///
    /// # Returns
    ///
    /// Returns `true` if an active token was revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revoke(&self, id: ApiTokenId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE api_tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
