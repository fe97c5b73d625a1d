//! Status enums and their transition rules.
//!
//! Each enum maps onto a `PostgreSQL` enum type of the same name (with the
//! `postgres` feature). Transition checks are pure so services can validate
//! a requested change before touching the database.

use serde::{Deserialize, Serialize};

/// Error returned when a requested state transition is not allowed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move {entity} from '{from}' to '{to}'")]
pub struct TransitionError {
    /// Kind of entity being transitioned.
    pub entity: &'static str,
    /// Current state.
    pub from: &'static str,
    /// Requested state.
    pub to: &'static str,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Buys from the catalog. Every account starts here.
    #[default]
    Customer,
    /// Individual maker selling their own work.
    Artist,
    /// Shop selling products.
    Store,
}

impl UserRole {
    /// Whether this role may own products and receive settlement credits.
    #[must_use]
    pub const fn is_seller(self) -> bool {
        matches!(self, Self::Artist | Self::Store)
    }

    /// Database / wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Artist => "artist",
            Self::Store => "store",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "artist" => Ok(Self::Artist),
            "store" => Ok(Self::Store),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Admin decision on a seller application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

/// Seller application review status.
///
/// `Pending -> Approved` and `Pending -> Rejected` are the only transitions;
/// both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "application_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    /// Database / wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Returns true once a decision has been recorded.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply an admin decision.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the application was already decided.
    pub const fn decide(self, decision: Decision) -> Result<Self, TransitionError> {
        let target = match decision {
            Decision::Approved => Self::Approved,
            Decision::Rejected => Self::Rejected,
        };
        match self {
            Self::Pending => Ok(target),
            Self::Approved | Self::Rejected => Err(TransitionError {
                entity: "application",
                from: self.as_str(),
                to: target.as_str(),
            }),
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order fulfilment status.
///
/// Orders advance one step at a time along
/// `pending -> processing -> shipped -> delivered`. Cancellation is a
/// separate operation, allowed only from `pending` or `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Database / wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The single status an order may advance to, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Whether the buyer may still cancel.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Validate a forward status update.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless `target` is exactly the next step.
    pub fn advance_to(self, target: Self) -> Result<Self, TransitionError> {
        if self.next() == Some(target) {
            Ok(target)
        } else {
            Err(TransitionError {
                entity: "order",
                from: self.as_str(),
                to: target.as_str(),
            })
        }
    }

    /// Validate a cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the order is pending or processing.
    pub const fn cancel(self) -> Result<Self, TransitionError> {
        if self.is_cancellable() {
            Ok(Self::Cancelled)
        } else {
            Err(TransitionError {
                entity: "order",
                from: self.as_str(),
                to: Self::Cancelled.as_str(),
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Ledger transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "transaction_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Commission,
}

impl TransactionKind {
    /// Direction implied by the type when no other context applies.
    ///
    /// Payments debit the buyer; the seller's share of a settled order is a
    /// payment posted as a credit (see [`crate::LedgerEntry::seller_credit`]).
    #[must_use]
    pub const fn default_direction(self) -> Direction {
        match self {
            Self::Deposit | Self::Refund | Self::Commission => Direction::Credit,
            Self::Withdrawal | Self::Payment => Direction::Debit,
        }
    }

    /// Database / wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Payment => "payment",
            Self::Refund => "refund",
            Self::Commission => "commission",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "payment" => Ok(Self::Payment),
            "refund" => Ok(Self::Refund),
            "commission" => Ok(Self::Commission),
            _ => Err(format!("invalid transaction type: {s}")),
        }
    }
}

/// Whether a ledger entry adds to or takes from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "entry_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

/// Ledger transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "transaction_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// Notification category shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Payment,
    System,
    Promotion,
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "payment" => Ok(Self::Payment),
            "system" => Ok(Self::System),
            "promotion" => Ok(Self::Promotion),
            _ => Err(format!("invalid notification type: {s}")),
        }
    }
}

/// Staff action recorded in the admin activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin_action", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Approve,
    Reject,
    Block,
    Unblock,
}

impl AdminAction {
    /// Database / wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }

    /// The action recorded for a decision on a seller application.
    #[must_use]
    pub const fn for_decision(decision: Decision) -> Self {
        match decision {
            Decision::Approved => Self::Approve,
            Decision::Rejected => Self::Reject,
        }
    }
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "block" => Ok(Self::Block),
            "unblock" => Ok(Self::Unblock),
            _ => Err(format!("invalid admin action: {s}")),
        }
    }
}
