//! Category and product repositories.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use atelier_core::{CategoryId, Money, Page, ProductId, Quantity, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Category, Product};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    parent_id: Option<CategoryId>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    seller_id: UserId,
    category_id: CategoryId,
    name: String,
    description: String,
    price: Money,
    stock: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = u32::try_from(row.stock).map_err(|e| RepositoryError::corrupt("stock", e))?;
        Ok(Self {
            id: row.id,
            seller_id: row.seller_id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CATEGORY_COLUMNS: &str = "id, name, parent_id, is_active, created_at";
const PRODUCT_COLUMNS: &str = "id, seller_id, category_id, name, description, price, stock, \
                               is_active, created_at, updated_at";

fn to_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::NotFound` if the parent does not exist.
    pub async fn create(
        &self,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO categories (name, parent_id) VALUES ($1, $2) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name)
        .bind(parent_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            map_unique_violation(e, "category name already exists")
        })?;
        Ok(row.into())
    }
}

// =============================================================================
// Products
// =============================================================================

/// Validated product fields for inserts and full updates.
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
}

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub seller_id: Option<UserId>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    /// Include deactivated products (seller views).
    pub include_inactive: bool,
}

/// Outcome of removing a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    Deleted,
    /// Referenced by orders, so kept but hidden.
    Deactivated,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stock does not fit a
    /// database integer.
    pub async fn create(
        &self,
        seller_id: UserId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let stock = stock_to_i32(fields.stock)?;
        sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products (seller_id, category_id, name, description, price, stock, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(seller_id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(stock)
        .bind(fields.is_active)
        .fetch_one(self.pool)
        .await?
        .try_into()
    }

    /// Replace a product's fields if it belongs to `seller_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product is owned by the seller.
    pub async fn update(
        &self,
        id: ProductId,
        seller_id: UserId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let stock = stock_to_i32(fields.stock)?;
        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products
             SET category_id = $3, name = $4, description = $5, price = $6, stock = $7,
                 is_active = $8, updated_at = NOW()
             WHERE id = $1 AND seller_id = $2
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(seller_id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(stock)
        .bind(fields.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// List products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Product>, RepositoryError> {
        const WHERE: &str = "WHERE ($1::int IS NULL OR category_id = $1)
               AND ($2::int IS NULL OR seller_id = $2)
               AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')
               AND ($4 OR is_active)";

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(filter.category_id)
            .bind(filter.seller_id)
            .bind(filter.search.as_deref())
            .bind(filter.include_inactive)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(filter.category_id)
        .bind(filter.seller_id)
        .bind(filter.search.as_deref())
        .bind(filter.include_inactive)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(Page {
            count,
            results: to_products(rows)?,
        })
    }

    /// Delete a seller's product, or deactivate it if orders reference it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product is owned by the seller.
    pub async fn remove(
        &self,
        id: ProductId,
        seller_id: UserId,
    ) -> Result<ProductRemoval, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<ProductId> = sqlx::query_scalar(
            "SELECT id FROM products WHERE id = $1 AND seller_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(seller_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let removal = if referenced {
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deactivated
        } else {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deleted
        };

        tx.commit().await?;
        Ok(removal)
    }
}

fn stock_to_i32(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock).map_err(|_| RepositoryError::DataCorruption(format!("stock {stock} out of range")))
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Lock products in ascending ID order.
///
/// Locking in a fixed order keeps concurrent checkouts from deadlocking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let mut ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    ids.sort_unstable();
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;
    to_products(rows)
}

/// Take `quantity` units out of stock.
///
/// Returns `false` without changing anything when stock is short.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn take_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: Quantity,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
    )
    .bind(id)
    .bind(quantity.as_i32())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Return `quantity` units to stock, saturating at the largest `INTEGER`.
///
/// A seller may have raised stock to the column maximum since the order was
/// placed; the sum is computed as `bigint` so the restock cannot overflow.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: Quantity,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products
         SET stock = LEAST(stock::bigint + $2, 2147483647)::integer, updated_at = NOW()
         WHERE id = $1",
    )
        .bind(id)
        .bind(quantity.as_i32())
        .execute(conn)
        .await?;
    Ok(())
}
