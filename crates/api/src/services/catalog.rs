//! Catalog: seller-owned products and admin-managed categories.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};

use atelier_core::{CategoryId, Money, Page, ProductId, Rating, UserId};

use super::{ServiceError, missing};
use crate::db::catalog::{ProductFields, ProductFilter, ProductRemoval};
use crate::db::{CategoryRepository, ProductRepository, ReviewRepository, UserRepository};
use crate::models::{Category, Product, Review};

const MAX_NAME_LENGTH: usize = 200;
const MAX_CATEGORY_NAME_LENGTH: usize = 100;
const MAX_COMMENT_LENGTH: usize = 2000;

/// Product fields as submitted by a seller.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductInput {
    /// Check field-level rules and convert to storable fields.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` on a blank or overlong name, a
    /// price that is negative, sub-cent or above [`Money::MAX`], or a stock
    /// outside `0..=i32::MAX`.
    pub fn validate(self) -> Result<ProductFields, ServiceError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ServiceError::validation("name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ServiceError::validation(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        let price = Money::new(self.price)?;
        let stock = u32::try_from(self.stock)
            .ok()
            .filter(|s| i32::try_from(*s).is_ok())
            .ok_or_else(|| ServiceError::validation("stock must be between 0 and 2147483647"))?;

        Ok(ProductFields {
            category_id: self.category_id,
            name,
            description: self.description.trim().to_owned(),
            price,
            stock,
            is_active: self.is_active,
        })
    }
}

/// A review as submitted by a buyer.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ReviewInput {
    fn validate(self) -> Result<(Rating, Option<String>), ServiceError> {
        let rating = Rating::new(self.rating)?;
        let comment = self
            .comment
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH)
        {
            return Err(ServiceError::validation(format!(
                "comment must be at most {MAX_COMMENT_LENGTH} characters"
            )));
        }
        Ok((rating, comment))
    }
}

/// A page of reviews with the product's average rating.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewList {
    #[serde(flatten)]
    pub page: Page<Review>,
    /// Mean of every rating, to two decimals; `null` with no reviews.
    pub average_rating: Option<Decimal>,
}

/// Product and category operations.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn require_seller(&self, user_id: UserId) -> Result<(), ServiceError> {
        let profile = UserRepository::new(&self.pool)
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile"))?;
        profile.details.expect_seller()?;
        Ok(())
    }

    async fn require_active_category(&self, id: CategoryId) -> Result<(), ServiceError> {
        match CategoryRepository::new(&self.pool).get(id).await? {
            Some(category) if category.is_active => Ok(()),
            _ => Err(ServiceError::validation(format!(
                "category {id} does not exist or is inactive"
            ))),
        }
    }

    /// List a product.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` unless the user is an artist or
    /// store, the fields are valid and the category is active.
    #[instrument(skip(self, input), fields(seller_id = %seller_id))]
    pub async fn create_product(
        &self,
        seller_id: UserId,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        let fields = input.validate()?;
        self.require_seller(seller_id).await?;
        self.require_active_category(fields.category_id).await?;

        let product = ProductRepository::new(&self.pool)
            .create(seller_id, &fields)
            .await?;
        info!(product_id = %product.id, "Created product");
        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` unless the seller owns the product,
    /// and `ServiceError::Validation` as for [`Self::create_product`].
    #[instrument(skip(self, input), fields(seller_id = %seller_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        seller_id: UserId,
        product_id: ProductId,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        let fields = input.validate()?;
        self.require_active_category(fields.category_id).await?;

        ProductRepository::new(&self.pool)
            .update(product_id, seller_id, &fields)
            .await
            .map_err(missing("product"))
    }

    /// Delete a product, or deactivate it when orders reference it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` unless the seller owns the product.
    #[instrument(skip(self), fields(seller_id = %seller_id, product_id = %product_id))]
    pub async fn delete_product(
        &self,
        seller_id: UserId,
        product_id: ProductId,
    ) -> Result<ProductRemoval, ServiceError> {
        let removal = ProductRepository::new(&self.pool)
            .remove(product_id, seller_id)
            .await
            .map_err(missing("product"))?;
        info!(?removal, "Removed product");
        Ok(removal)
    }

    /// Browse products.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Product>, ServiceError> {
        Ok(ProductRepository::new(&self.pool)
            .list(filter, limit, offset)
            .await?)
    }

    /// Get a product. Inactive products are only visible to their seller.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if it does not exist or is hidden.
    pub async fn get_product(
        &self,
        id: ProductId,
        viewer: Option<UserId>,
    ) -> Result<Product, ServiceError> {
        ProductRepository::new(&self.pool)
            .get(id)
            .await?
            .filter(|p| p.is_active || viewer == Some(p.seller_id))
            .ok_or_else(|| ServiceError::not_found("product"))
    }

    /// Review an active product, once per user.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a rating outside one to five,
    /// an overlong comment or a seller reviewing their own product,
    /// `ServiceError::NotFound` if the product is missing or inactive, and
    /// `ServiceError::Conflict` if the user already reviewed it.
    #[instrument(skip(self, input), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_review(
        &self,
        user_id: UserId,
        product_id: ProductId,
        input: ReviewInput,
    ) -> Result<Review, ServiceError> {
        let (rating, comment) = input.validate()?;
        let product = self.get_product(product_id, None).await?;
        if product.seller_id == user_id {
            return Err(ServiceError::validation(
                "sellers cannot review their own products",
            ));
        }

        let review = ReviewRepository::new(&self.pool)
            .create(product_id, user_id, rating, comment.as_deref())
            .await?;
        info!(review_id = %review.id, rating = %rating, "Added review");
        Ok(review)
    }

    /// A visible product's reviews, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the product does not exist or is
    /// hidden from `viewer`.
    pub async fn list_reviews(
        &self,
        product_id: ProductId,
        viewer: Option<UserId>,
        limit: i64,
        offset: i64,
    ) -> Result<ReviewList, ServiceError> {
        self.get_product(product_id, viewer).await?;
        let (page, average_rating) = ReviewRepository::new(&self.pool)
            .list_for_product(product_id, limit, offset)
            .await?;
        Ok(ReviewList {
            page,
            average_rating,
        })
    }

    /// Active categories.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(CategoryRepository::new(&self.pool).list_active().await?)
    }

    /// Add a category.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a blank name or a missing
    /// parent, and `ServiceError::Conflict` if the name is taken.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("name cannot be empty"));
        }
        if name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
            return Err(ServiceError::validation(format!(
                "name must be at most {MAX_CATEGORY_NAME_LENGTH} characters"
            )));
        }

        let category = CategoryRepository::new(&self.pool)
            .create(name, parent_id)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => {
                    ServiceError::validation("parent category does not exist")
                }
                other => other.into(),
            })?;
        info!(category_id = %category.id, "Created category");
        Ok(category)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            category_id: CategoryId::new(1),
            name: "  Ceramic Bowl ".to_owned(),
            description: String::new(),
            price: Decimal::new(4500, 2),
            stock: 3,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_trims_name() {
        let fields = input().validate().unwrap();
        assert_eq!(fields.name, "Ceramic Bowl");
        assert_eq!(fields.price, Money::from_cents(4500).unwrap());
        assert_eq!(fields.stock, 3);
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut i = input();
        i.name = "   ".to_owned();
        assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut i = input();
        i.price = Decimal::new(-1, 2);
        assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_sub_cent_price() {
        let mut i = input();
        i.price = Decimal::new(1001, 3);
        assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_price_upper_bound() {
        let mut i = input();
        i.price = Money::MAX.amount();
        assert_eq!(i.validate().unwrap().price, Money::MAX);

        let mut i = input();
        i.price = Decimal::new(1_000_000_000_000, 0);
        let err = i.validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m.contains("at most")));
    }

    #[test]
    fn test_validate_stock_bounds() {
        let mut i = input();
        i.stock = -1;
        assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));

        let mut i = input();
        i.stock = i64::from(i32::MAX) + 1;
        assert!(matches!(i.validate(), Err(ServiceError::Validation(_))));

        let mut i = input();
        i.stock = 0;
        assert_eq!(i.validate().unwrap().stock, 0);

        let mut i = input();
        i.stock = i64::from(i32::MAX);
        assert_eq!(i.validate().unwrap().stock, 2_147_483_647);
    }

    #[test]
    fn test_review_input_validation() {
        let (rating, comment) = ReviewInput {
            rating: 4,
            comment: Some("  Lovely glaze  ".to_owned()),
        }
        .validate()
        .unwrap();
        assert_eq!(rating.get(), 4);
        assert_eq!(comment.as_deref(), Some("Lovely glaze"));

        let (_, comment) = ReviewInput {
            rating: 1,
            comment: Some("   ".to_owned()),
        }
        .validate()
        .unwrap();
        assert!(comment.is_none());

        for rating in [0, 6, -1] {
            let err = ReviewInput {
                rating,
                comment: None,
            }
            .validate()
            .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{rating}");
        }

        let long = ReviewInput {
            rating: 5,
            comment: Some("x".repeat(MAX_COMMENT_LENGTH + 1)),
        };
        assert!(matches!(long.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_input_defaults() {
        let parsed: ProductInput = serde_json::from_str(
            r#"{"category_id": 2, "name": "Print", "price": "12.50", "stock": 1}"#,
        )
        .unwrap();
        assert!(parsed.is_active);
        assert!(parsed.description.is_empty());
    }
}
