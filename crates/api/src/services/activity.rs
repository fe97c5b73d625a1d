//! Admin activity log reads.
//!
//! Entries are written by the services that perform staff actions, inside
//! the same transaction; this service only lists them.

use sqlx::PgPool;

use atelier_core::Page;

use super::ServiceError;
use crate::db::ActivityRepository;
use crate::db::activities::ActivityFilter;
use crate::models::AdminActivity;

/// Activity log queries.
#[derive(Clone)]
pub struct ActivityService {
    pool: PgPool,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Staff actions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        filter: ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<AdminActivity>, ServiceError> {
        Ok(ActivityRepository::new(&self.pool)
            .list(filter, limit, offset)
            .await?)
    }
}
