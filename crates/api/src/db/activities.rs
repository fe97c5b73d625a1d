//! Admin activity log repository.
//!
//! Rows are only ever inserted, from inside the transaction of the staff
//! action they record.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use atelier_core::{ActivityId, AdminAction, Page, UserId};

use super::RepositoryError;
use crate::models::{AdminActivity, RelatedObject};

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: ActivityId,
    admin_id: UserId,
    action: AdminAction,
    description: String,
    target_type: Option<String>,
    target_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for AdminActivity {
    fn from(row: ActivityRow) -> Self {
        let target = match (row.target_type, row.target_id) {
            (Some(kind), Some(id)) => Some(RelatedObject { kind, id }),
            _ => None,
        };
        Self {
            id: row.id,
            admin_id: row.admin_id,
            action: row.action,
            description: row.description,
            target,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, admin_id, action, description, target_type, target_id, created_at";

/// Filters for the activity log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityFilter {
    pub admin_id: Option<UserId>,
    pub action: Option<AdminAction>,
}

/// Repository for activity log reads.
pub struct ActivityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepository<'a> {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List activity, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<AdminActivity>, RepositoryError> {
        const WHERE: &str = "WHERE ($1::int IS NULL OR admin_id = $1)
               AND ($2::admin_action IS NULL OR action = $2)";

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM admin_activities {WHERE}"))
                .bind(filter.admin_id)
                .bind(filter.action)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {COLUMNS} FROM admin_activities {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.admin_id)
        .bind(filter.action)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(Page {
            count,
            results: rows.into_iter().map(Into::into).collect(),
        })
    }
}

/// Record a staff action.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn record(
    conn: &mut PgConnection,
    admin_id: UserId,
    action: AdminAction,
    description: &str,
    target: Option<&RelatedObject>,
) -> Result<AdminActivity, RepositoryError> {
    let row = sqlx::query_as::<_, ActivityRow>(&format!(
        "INSERT INTO admin_activities (admin_id, action, description, target_type, target_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(admin_id)
    .bind(action)
    .bind(description)
    .bind(target.map(|t| t.kind.as_str()))
    .bind(target.map(|t| t.id))
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}
