//! Wallet ledger: deposits, withdrawals, settlement and audits.
//!
//! Every balance change goes through [`post_entry`], which applies a ledger
//! entry to a wallet already locked by the caller's transaction and writes
//! the new row and balance together. Stored balance therefore always equals
//! the signed sum of the wallet's transactions at commit.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};

use atelier_core::{LedgerEntry, Money, OrderId, OrderStatus, Page, UserId, WalletId, ledger};

use super::notifications::{DomainEvent, NotificationDispatcher};
use super::ServiceError;
use crate::db::wallets::{self, TransactionFilter};
use crate::db::{WalletRepository, orders};
use crate::models::{Wallet, WalletOwner, WalletTransaction};

const MAX_REFERENCE_LENGTH: usize = 255;

/// Apply `entry` to a locked wallet and record it.
///
/// Updates `wallet.balance` in place so later entries in the same
/// transaction see the new balance.
///
/// # Errors
///
/// Returns `ServiceError::InsufficientFunds` if a debit exceeds the balance.
pub(crate) async fn post_entry(
    conn: &mut PgConnection,
    wallet: &mut Wallet,
    entry: LedgerEntry,
    reference_id: Option<&str>,
    description: &str,
) -> Result<WalletTransaction, ServiceError> {
    let new_balance = entry.apply(wallet.balance)?;
    let txn =
        wallets::append_entry(conn, wallet.id, entry, new_balance, reference_id, description)
            .await?;
    wallet.balance = new_balance;
    Ok(txn)
}

/// Result of settling an order.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub order_id: OrderId,
    /// Total commission credited to the platform wallet.
    pub commission: Money,
    /// Net credit per seller.
    pub seller_credits: BTreeMap<UserId, Money>,
}

/// Ledger consistency report for one wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletAudit {
    pub wallet_id: WalletId,
    pub owner: WalletOwner,
    pub stored_balance: Money,
    /// Signed sum of completed transactions.
    pub ledger_balance: Decimal,
    pub entries: usize,
    /// Whether replaying the entries in order ever went negative.
    pub overdrawn: bool,
}

impl WalletAudit {
    /// Stored balance matches the ledger and no prefix overdraws.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.stored_balance.amount() == self.ledger_balance && !self.overdrawn
    }
}

/// Wallet operations.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
    dispatcher: NotificationDispatcher,
}

impl WalletService {
    /// Create a new wallet service.
    #[must_use]
    pub const fn new(pool: PgPool, dispatcher: NotificationDispatcher) -> Self {
        Self { pool, dispatcher }
    }

    /// Credit a user's wallet.
    ///
    /// With a `reference_id`, a repeated request returns the transaction
    /// first posted under that reference instead of crediting again.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` unless the amount is positive with
    /// at most two decimals and keeps the balance within [`Money::MAX`],
    /// `ServiceError::NotFound` if the user does not exist, and
    /// `ServiceError::Conflict` if the reference was used for a different
    /// amount.
    #[instrument(skip(self, description), fields(user_id = %user_id, amount = %amount))]
    pub async fn deposit(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference_id: Option<&str>,
        description: &str,
    ) -> Result<WalletTransaction, ServiceError> {
        let entry = LedgerEntry::deposit(Money::positive(amount)?)?;
        let txn = self.adjust(user_id, entry, reference_id, description).await?;
        info!(transaction_id = %txn.id, "Deposited");
        Ok(txn)
    }

    /// Debit a user's wallet.
    ///
    /// Replays under a `reference_id` behave as for [`Self::deposit`].
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` unless the amount is positive,
    /// `ServiceError::InsufficientFunds` if it exceeds the balance, and
    /// `ServiceError::Conflict` if the reference was used for a different
    /// amount.
    #[instrument(skip(self, description), fields(user_id = %user_id, amount = %amount))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference_id: Option<&str>,
        description: &str,
    ) -> Result<WalletTransaction, ServiceError> {
        let entry = LedgerEntry::withdrawal(Money::positive(amount)?)?;
        let txn = self.adjust(user_id, entry, reference_id, description).await?;
        info!(transaction_id = %txn.id, "Withdrew");
        Ok(txn)
    }

    /// Post a deposit or withdrawal, at most once per reference.
    ///
    /// The reference is checked under the wallet lock, so concurrent
    /// replays of one request serialize and only the first posts.
    async fn adjust(
        &self,
        user_id: UserId,
        entry: LedgerEntry,
        reference_id: Option<&str>,
        description: &str,
    ) -> Result<WalletTransaction, ServiceError> {
        let reference_id = reference_id.map(validate_reference).transpose()?;

        let mut tx = self.pool.begin().await?;
        let mut wallet = wallets::lock_user_wallet(&mut *tx, user_id)
            .await
            .map_err(super::missing("user"))?;

        if let Some(reference) = reference_id
            && let Some(existing) =
                wallets::find_by_reference(&mut *tx, wallet.id, entry.kind, reference).await?
        {
            if existing.amount != entry.amount {
                return Err(ServiceError::Conflict(format!(
                    "reference '{reference}' was already used for {}",
                    existing.amount
                )));
            }
            info!(transaction_id = %existing.id, reference, "Replayed wallet adjustment");
            return Ok(existing);
        }

        let txn = post_entry(&mut *tx, &mut wallet, entry, reference_id, description).await?;
        tx.commit().await?;

        info!(balance = %wallet.balance, "Adjusted wallet");
        Ok(txn)
    }

    /// Pay out a paid order: commission to the platform, the rest to sellers.
    ///
    /// Seller wallets are locked in ascending user order after the platform
    /// wallet.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` if the order is unpaid or
    /// cancelled and `ServiceError::Conflict` if it was already settled.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn settle_order(&self, order_id: OrderId) -> Result<Settlement, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut *tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order"))?;
        if !order.payment_status {
            return Err(ServiceError::InvalidState(format!(
                "order {order_id} has not been paid"
            )));
        }
        if order.is_settled() {
            return Err(ServiceError::Conflict(format!(
                "order {order_id} is already settled"
            )));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidState(format!(
                "order {order_id} is cancelled"
            )));
        }

        let reference = order.ledger_reference();
        let mut platform = wallets::lock_platform_wallet(&mut *tx).await?;

        let seller_ids: BTreeSet<UserId> = order.items.iter().map(|i| i.seller_id).collect();
        let mut seller_wallets = BTreeMap::new();
        for seller_id in seller_ids {
            let wallet = wallets::lock_user_wallet(&mut *tx, seller_id).await?;
            seller_wallets.insert(seller_id, wallet);
        }

        let mut commission = Money::ZERO;
        let mut seller_credits: BTreeMap<UserId, Money> = BTreeMap::new();
        for item in &order.items {
            if !item.commission_amount.is_zero() {
                post_entry(
                    &mut *tx,
                    &mut platform,
                    LedgerEntry::commission(item.commission_amount)?,
                    Some(&reference),
                    &format!("Commission on order #{order_id}"),
                )
                .await?;
                commission = commission.checked_add(item.commission_amount)?;
            }

            let credit = item.seller_credit()?;
            if !credit.is_zero() {
                let wallet = seller_wallets
                    .get_mut(&item.seller_id)
                    .ok_or_else(|| ServiceError::not_found("seller wallet"))?;
                post_entry(
                    &mut *tx,
                    wallet,
                    LedgerEntry::seller_credit(credit)?,
                    Some(&reference),
                    &format!("Sale of order #{order_id}"),
                )
                .await?;
                let total = seller_credits.entry(item.seller_id).or_insert(Money::ZERO);
                *total = total.checked_add(credit)?;
            }
        }

        orders::mark_settled(&mut *tx, order_id).await?;
        tx.commit().await?;

        info!(
            commission = %commission,
            sellers = seller_credits.len(),
            "Settled order"
        );

        self.dispatcher
            .dispatch_all(
                seller_credits
                    .iter()
                    .map(|(seller_id, amount)| DomainEvent::OrderSettled {
                        seller_id: *seller_id,
                        order_id,
                        amount: *amount,
                    })
                    .collect(),
            )
            .await;

        Ok(Settlement {
            order_id,
            commission,
            seller_credits,
        })
    }

    /// A user's wallet, created empty on first access.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    pub async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, ServiceError> {
        WalletRepository::new(&self.pool)
            .get_or_create_for_user(user_id)
            .await
            .map_err(super::missing("user"))
    }

    /// A user's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user does not exist.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        filter: TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<WalletTransaction>, ServiceError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from >= to
        {
            return Err(ServiceError::validation("'from' must be before 'to'"));
        }
        let wallet = self.get_wallet(user_id).await?;
        Ok(WalletRepository::new(&self.pool)
            .transactions(wallet.id, filter, limit, offset)
            .await?)
    }

    /// Recompute a wallet's balance from its ledger.
    ///
    /// The stored balance and the entries come from one database snapshot,
    /// so postings that commit while the audit runs cannot show up as a
    /// mismatch.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the wallet does not exist.
    pub async fn audit_wallet(&self, wallet_id: WalletId) -> Result<WalletAudit, ServiceError> {
        let (wallet, entries) = WalletRepository::new(&self.pool)
            .snapshot(wallet_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("wallet"))?;
        let audit = WalletAudit {
            wallet_id: wallet.id,
            owner: wallet.owner,
            stored_balance: wallet.balance,
            ledger_balance: ledger::fold(&entries),
            entries: entries.len(),
            overdrawn: ledger::replay(&entries).is_err(),
        };
        if !audit.is_consistent() {
            warn!(
                wallet_id = %audit.wallet_id,
                stored = %audit.stored_balance,
                ledger = %audit.ledger_balance,
                overdrawn = audit.overdrawn,
                "Wallet ledger mismatch"
            );
        }
        Ok(audit)
    }

    /// Audit every wallet, platform wallet first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn audit_all(&self) -> Result<Vec<WalletAudit>, ServiceError> {
        let ids = WalletRepository::new(&self.pool).list_ids().await?;
        let mut audits = Vec::with_capacity(ids.len());
        for id in ids {
            audits.push(self.audit_wallet(id).await?);
        }
        info!(
            wallets = audits.len(),
            mismatched = audits.iter().filter(|a| !a.is_consistent()).count(),
            "Audited wallets"
        );
        Ok(audits)
    }
}

fn validate_reference(reference: &str) -> Result<&str, ServiceError> {
    let reference = reference.trim();
    if reference.is_empty() || reference.chars().count() > MAX_REFERENCE_LENGTH {
        return Err(ServiceError::validation(format!(
            "reference must be 1 to {MAX_REFERENCE_LENGTH} characters"
        )));
    }
    Ok(reference)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn audit(stored: i64, ledger: i64, overdrawn: bool) -> WalletAudit {
        WalletAudit {
            wallet_id: WalletId::new(1),
            owner: WalletOwner::Platform,
            stored_balance: Money::from_cents(stored).unwrap(),
            ledger_balance: Decimal::new(ledger, 2),
            entries: 2,
            overdrawn,
        }
    }

    #[test]
    fn test_audit_consistency() {
        assert!(audit(1000, 1000, false).is_consistent());
        assert!(!audit(1000, 900, false).is_consistent());
        assert!(!audit(1000, 1000, true).is_consistent());
    }

    #[test]
    fn test_reference_is_trimmed_and_bounded() {
        assert_eq!(validate_reference("  payout-17 ").unwrap(), "payout-17");
        assert!(matches!(
            validate_reference("   "),
            Err(ServiceError::Validation(_))
        ));
        assert!(validate_reference(&"r".repeat(MAX_REFERENCE_LENGTH)).is_ok());
        assert!(validate_reference(&"r".repeat(MAX_REFERENCE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_settlement_serializes_seller_map() {
        let mut seller_credits = BTreeMap::new();
        seller_credits.insert(UserId::new(4), Money::from_cents(18_000).unwrap());
        let settlement = Settlement {
            order_id: OrderId::new(9),
            commission: Money::from_cents(2000).unwrap(),
            seller_credits,
        };
        let json = serde_json::to_value(&settlement).unwrap();
        assert_eq!(json["commission"], "20.00");
        assert_eq!(json["seller_credits"]["4"], "180.00");
    }
}
