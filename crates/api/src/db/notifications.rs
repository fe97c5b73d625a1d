//! Notification repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::{NotificationId, NotificationKind, Page, UserId};

use super::RepositoryError;
use crate::models::{Notification, RelatedObject};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    user_id: UserId,
    kind: NotificationKind,
    title: String,
    message: String,
    is_read: bool,
    related_type: Option<String>,
    related_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let related = match (row.related_type, row.related_id) {
            (Some(kind), Some(id)) => Some(RelatedObject { kind, id }),
            _ => None,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            is_read: row.is_read,
            related,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str =
    "id, user_id, kind, title, message, is_read, related_type, related_id, created_at";

/// A notification to be stored.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedObject>,
}

/// Filters for a user's notification list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    pub is_read: Option<bool>,
}

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewNotification) -> Result<Notification, RepositoryError> {
        let (related_type, related_id) = new
            .related
            .as_ref()
            .map_or((None, None), |r| (Some(r.kind.as_str()), Some(r.id)));

        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications (user_id, kind, title, message, related_type, related_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(new.kind)
        .bind(&new.title)
        .bind(&new.message)
        .bind(related_type)
        .bind(related_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// List a user's notifications, newest first, with the unread total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Page<Notification>, i64), RepositoryError> {
        const WHERE: &str = "WHERE user_id = $1
               AND ($2::notification_kind IS NULL OR kind = $2)
               AND ($3::boolean IS NULL OR is_read = $3)";

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications {WHERE}"))
            .bind(user_id)
            .bind(filter.kind)
            .bind(filter.is_read)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(filter.kind)
        .bind(filter.is_read)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let unread: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok((
            Page {
                count,
                results: rows.into_iter().map(Into::into).collect(),
            },
            unread,
        ))
    }

    /// Mark one of the user's notifications as read.
    ///
    /// # Returns
    ///
    /// Returns `false` if the notification does not exist or belongs to
    /// someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a user's unread notifications as read.
    ///
    /// # Returns
    ///
    /// Returns the number of notifications updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
