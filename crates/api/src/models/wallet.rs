//! Wallet and ledger domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{
    Direction, LedgerEntry, Money, TransactionId, TransactionKind, TransactionStatus, UserId,
    WalletId,
};

/// Who a wallet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "owner", content = "user_id", rename_all = "snake_case")]
pub enum WalletOwner {
    User(UserId),
    /// The single wallet collecting commission.
    Platform,
}

impl std::fmt::Display for WalletOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Platform => f.write_str("platform"),
        }
    }
}

/// A wallet with its cached balance.
#[derive(Debug, Clone, Serialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner: WalletOwner,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A posted ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub kind: TransactionKind,
    pub direction: Direction,
    pub amount: Money,
    pub reference_id: Option<String>,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// The movement this row records.
    #[must_use]
    pub const fn entry(&self) -> LedgerEntry {
        LedgerEntry {
            kind: self.kind,
            direction: self.direction,
            amount: self.amount,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_serialization() {
        let json = serde_json::to_value(WalletOwner::User(UserId::new(3))).unwrap();
        assert_eq!(json, serde_json::json!({ "owner": "user", "user_id": 3 }));
        let json = serde_json::to_value(WalletOwner::Platform).unwrap();
        assert_eq!(json, serde_json::json!({ "owner": "platform" }));
    }

    #[test]
    fn test_owner_display() {
        assert_eq!(WalletOwner::User(UserId::new(3)).to_string(), "user:3");
        assert_eq!(WalletOwner::Platform.to_string(), "platform");
    }
}
