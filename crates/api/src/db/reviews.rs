//! Product review repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use atelier_core::{Page, ProductId, Rating, ReviewId, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    rating: Rating,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, product_id, user_id, rating, comment, created_at";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: Rating,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "INSERT INTO product_reviews (product_id, user_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "you have already reviewed this product"))?;
        Ok(row.into())
    }

    /// A product's reviews, newest first, with the average rating over all
    /// of them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        limit: i64,
        offset: i64,
    ) -> Result<(Page<Review>, Option<Decimal>), RepositoryError> {
        let (count, average): (i64, Option<Decimal>) = sqlx::query_as(
            "SELECT COUNT(*), ROUND(AVG(rating), 2) FROM product_reviews WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {COLUMNS} FROM product_reviews
             WHERE product_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((
            Page {
                count,
                results: rows.into_iter().map(Into::into).collect(),
            },
            average,
        ))
    }
}
