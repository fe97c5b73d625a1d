//! Ledger entries and balance folds.
//!
//! Every balance change is an append-only entry carrying a positive amount
//! and a [`Direction`]. A wallet's balance is the fold of its completed
//! entries and must equal the stored balance at all times.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Direction, Money, MoneyError, TransactionKind};

/// Errors raised when applying ledger entries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A debit exceeds the available balance.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance before the debit.
        balance: Money,
        /// Debit amount.
        requested: Money,
    },
    /// An entry amount was zero or negative.
    #[error(transparent)]
    Amount(#[from] MoneyError),
}

/// A single balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: TransactionKind,
    pub direction: Direction,
    pub amount: Money,
}

impl LedgerEntry {
    fn build(kind: TransactionKind, direction: Direction, amount: Money) -> Result<Self, MoneyError> {
        if amount.is_zero() {
            return Err(MoneyError::NotPositive);
        }
        Ok(Self {
            kind,
            direction,
            amount,
        })
    }

    /// Customer top-up.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn deposit(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Deposit, Direction::Credit, amount)
    }

    /// Customer cash-out.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn withdrawal(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Withdrawal, Direction::Debit, amount)
    }

    /// Buyer paying for an order from their wallet.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn purchase(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Payment, Direction::Debit, amount)
    }

    /// Seller's share of a settled order.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn seller_credit(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Payment, Direction::Credit, amount)
    }

    /// Platform's commission on a settled order.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn commission(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Commission, Direction::Credit, amount)
    }

    /// Money returned to a buyer.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NotPositive`] for a zero amount.
    pub fn refund(amount: Money) -> Result<Self, MoneyError> {
        Self::build(TransactionKind::Refund, Direction::Credit, amount)
    }

    /// Signed effect on the balance.
    #[must_use]
    pub fn signed(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount.amount(),
            Direction::Debit => -self.amount.amount(),
        }
    }

    /// Apply this entry to `balance`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] when a debit exceeds the
    /// balance, or [`LedgerError::Amount`] when a credit would take the
    /// balance past [`Money::MAX`].
    pub fn apply(&self, balance: Money) -> Result<Money, LedgerError> {
        match self.direction {
            Direction::Credit => Ok(balance.checked_add(self.amount)?),
            Direction::Debit => {
                balance
                    .checked_sub(self.amount)
                    .map_err(|_| LedgerError::InsufficientFunds {
                        balance,
                        requested: self.amount,
                    })
            }
        }
    }
}

/// Fold signed entries into a balance, starting at zero.
///
/// Returns the raw signed sum so audits can report a negative fold instead
/// of failing on it.
pub fn fold<'a, I>(entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .fold(Decimal::ZERO, |acc, entry| acc + entry.signed())
}

/// Replay entries in order, failing at the first overdraft.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientFunds`] if any prefix would go negative.
pub fn replay<'a, I>(entries: I) -> Result<Money, LedgerError>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .try_fold(Money::ZERO, |balance, entry| entry.apply(balance))
}
