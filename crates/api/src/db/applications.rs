//! Seller application repository.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use atelier_core::{ApplicationId, ApplicationStatus, Page, UserId, UserRole};

use super::RepositoryError;
use crate::models::{ApplicationPayload, SellerApplication};

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: ApplicationId,
    user_id: UserId,
    requested_role: UserRole,
    payload: Json<ApplicationPayload>,
    status: ApplicationStatus,
    admin_notes: Option<String>,
    decided_by: Option<UserId>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for SellerApplication {
    type Error = RepositoryError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let payload = row.payload.0;
        if payload.details.role() != row.requested_role {
            return Err(RepositoryError::DataCorruption(format!(
                "application {} requests '{}' but carries '{}' details",
                row.id,
                row.requested_role,
                payload.details.role()
            )));
        }
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            requested_role: row.requested_role,
            payload,
            status: row.status,
            admin_notes: row.admin_notes,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = "id, user_id, requested_role, payload, status, admin_notes, \
                       decided_by, decided_at, created_at";

/// Repository for seller application database operations.
pub struct ApplicationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApplicationRepository<'a> {
    /// Create a new application repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an application by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ApplicationId) -> Result<Option<SellerApplication>, RepositoryError> {
        sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM seller_applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Get a user's most recent application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<SellerApplication>, RepositoryError> {
        sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM seller_applications
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// List applications, oldest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<SellerApplication>, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seller_applications WHERE ($1::application_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM seller_applications
             WHERE ($1::application_status IS NULL OR status = $1)
             ORDER BY created_at ASC, id ASC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(Page {
            count,
            results: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Whether the user has an application awaiting review.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn has_pending(conn: &mut PgConnection, user_id: UserId) -> Result<bool, RepositoryError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM seller_applications WHERE user_id = $1 AND status = 'pending')",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Insert a pending application.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user already has a pending
/// application.
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    payload: &ApplicationPayload,
) -> Result<SellerApplication, RepositoryError> {
    sqlx::query_as::<_, ApplicationRow>(&format!(
        "INSERT INTO seller_applications (user_id, requested_role, payload)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(payload.details.role())
    .bind(Json(payload))
    .fetch_one(conn)
    .await
    .map_err(|e| super::map_unique_violation(e, "an application is already pending"))?
    .try_into()
}

/// Lock an application row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: ApplicationId,
) -> Result<Option<SellerApplication>, RepositoryError> {
    sqlx::query_as::<_, ApplicationRow>(&format!(
        "SELECT {COLUMNS} FROM seller_applications WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .map(TryInto::try_into)
    .transpose()
}

/// Record an admin decision on a pending application.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the application is no longer pending.
pub async fn record_decision(
    conn: &mut PgConnection,
    id: ApplicationId,
    status: ApplicationStatus,
    decided_by: UserId,
    notes: Option<&str>,
) -> Result<SellerApplication, RepositoryError> {
    sqlx::query_as::<_, ApplicationRow>(&format!(
        "UPDATE seller_applications
         SET status = $2, decided_by = $3, admin_notes = $4, decided_at = NOW()
         WHERE id = $1 AND status = 'pending'
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .bind(decided_by)
    .bind(notes)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| RepositoryError::Conflict("application already decided".to_owned()))?
    .try_into()
}
