//! Wallet and ledger repository.
//!
//! Wallets are created lazily. The platform wallet has no user and is
//! unique through a partial index.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use atelier_core::{
    Direction, LedgerEntry, Money, Page, TransactionId, TransactionKind, TransactionStatus,
    UserId, WalletId,
};

use super::RepositoryError;
use crate::models::{Wallet, WalletOwner, WalletTransaction};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: WalletId,
    user_id: Option<UserId>,
    is_platform: bool,
    balance: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = RepositoryError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        let owner = match (row.user_id, row.is_platform) {
            (Some(user_id), false) => WalletOwner::User(user_id),
            (None, true) => WalletOwner::Platform,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "wallet {} has inconsistent ownership",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: row.id,
            owner,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: TransactionId,
    wallet_id: WalletId,
    kind: TransactionKind,
    direction: Direction,
    amount: Money,
    reference_id: Option<String>,
    description: String,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for WalletTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            wallet_id: row.wallet_id,
            kind: row.kind,
            direction: row.direction,
            amount: row.amount,
            reference_id: row.reference_id,
            description: row.description,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

const WALLET_COLUMNS: &str = "id, user_id, is_platform, balance, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, wallet_id, kind, direction, amount, reference_id, description, status, created_at";

/// Filters for a wallet's transaction history.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for wallet reads.
pub struct WalletRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WalletRepository<'a> {
    /// Create a new wallet repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's wallet, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_user(&self, user_id: UserId) -> Result<Wallet, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        ensure_user_wallet(&mut *conn, user_id).await?;
        sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?
        .try_into()
    }

    /// Get a user's wallet if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(&self, user_id: UserId) -> Result<Option<Wallet>, RepositoryError> {
        sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Get the platform wallet if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_platform(&self) -> Result<Option<Wallet>, RepositoryError> {
        sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE is_platform"
        ))
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// List a wallet's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions(
        &self,
        wallet_id: WalletId,
        filter: TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<WalletTransaction>, RepositoryError> {
        const WHERE: &str = "WHERE wallet_id = $1
               AND ($2::transaction_kind IS NULL OR kind = $2)
               AND ($3::timestamptz IS NULL OR created_at >= $3)
               AND ($4::timestamptz IS NULL OR created_at < $4)";

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM wallet_transactions {WHERE}"))
                .bind(wallet_id)
                .bind(filter.kind)
                .bind(filter.from)
                .bind(filter.to)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(wallet_id)
        .bind(filter.kind)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(Page {
            count,
            results: rows.into_iter().map(Into::into).collect(),
        })
    }

    /// A wallet row and its completed entries read from one snapshot.
    ///
    /// Both reads run in a `REPEATABLE READ` read-only transaction, so a
    /// posting that commits between them cannot make the stored balance and
    /// the ledger disagree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn snapshot(
        &self,
        wallet_id: WalletId,
    ) -> Result<Option<(Wallet, Vec<LedgerEntry>)>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let Some(row) = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1"
        ))
        .bind(wallet_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };
        let entries = completed_entries(&mut *tx, wallet_id).await?;
        tx.commit().await?;

        Ok(Some((row.try_into()?, entries)))
    }

    /// IDs of every wallet, platform wallet first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_ids(&self) -> Result<Vec<WalletId>, RepositoryError> {
        Ok(
            sqlx::query_scalar("SELECT id FROM wallets ORDER BY is_platform DESC, id ASC")
                .fetch_all(self.pool)
                .await?,
        )
    }
}

/// Every completed entry of a wallet in posting order.
///
/// IDs are drawn under the wallet lock and `created_at` is the insert's
/// wall-clock time, so both orders agree with posting order.
async fn completed_entries(
    conn: &mut PgConnection,
    wallet_id: WalletId,
) -> Result<Vec<LedgerEntry>, RepositoryError> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions
         WHERE wallet_id = $1 AND status = 'completed'
         ORDER BY id ASC"
    ))
    .bind(wallet_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| WalletTransaction::from(row).entry())
        .collect())
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn ensure_user_wallet(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;
    Ok(())
}

/// Lock a user's wallet, creating it first if needed.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
pub async fn lock_user_wallet(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Wallet, RepositoryError> {
    ensure_user_wallet(&mut *conn, user_id).await?;
    sqlx::query_as::<_, WalletRow>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(conn)
    .await?
    .try_into()
}

/// Lock the platform wallet, creating it first if needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_platform_wallet(conn: &mut PgConnection) -> Result<Wallet, RepositoryError> {
    sqlx::query(
        "INSERT INTO wallets (user_id, is_platform) VALUES (NULL, TRUE)
         ON CONFLICT (is_platform) WHERE is_platform DO NOTHING",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, WalletRow>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE is_platform FOR UPDATE"
    ))
    .fetch_one(conn)
    .await?
    .try_into()
}

/// The deposit or withdrawal already posted to a wallet under `reference_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_reference(
    conn: &mut PgConnection,
    wallet_id: WalletId,
    kind: TransactionKind,
    reference_id: &str,
) -> Result<Option<WalletTransaction>, RepositoryError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions
         WHERE wallet_id = $1 AND kind = $2 AND reference_id = $3"
    ))
    .bind(wallet_id)
    .bind(kind)
    .bind(reference_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Into::into))
}

/// Append a completed ledger row and store the wallet's new balance.
///
/// The caller holds the wallet lock and has already applied `entry` to the
/// balance it read under that lock.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if a deposit or withdrawal reuses a
/// reference already posted to the wallet, and `RepositoryError::Database`
/// if either statement fails.
pub async fn append_entry(
    conn: &mut PgConnection,
    wallet_id: WalletId,
    entry: LedgerEntry,
    new_balance: Money,
    reference_id: Option<&str>,
    description: &str,
) -> Result<WalletTransaction, RepositoryError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "INSERT INTO wallet_transactions (wallet_id, kind, direction, amount, reference_id, description)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(wallet_id)
    .bind(entry.kind)
    .bind(entry.direction)
    .bind(entry.amount)
    .bind(reference_id)
    .bind(description)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| super::map_unique_violation(e, "reference already used on this wallet"))?;

    sqlx::query("UPDATE wallets SET balance = $2, updated_at = NOW() WHERE id = $1")
        .bind(wallet_id)
        .bind(new_balance)
        .execute(conn)
        .await?;

    Ok(row.into())
}
