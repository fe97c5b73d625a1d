//! Account and profile domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{ApiTokenId, CommissionRate, Email, RoleProfile, UserId, UserRole};

/// A marketplace account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub is_staff: bool,
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's profile: common core plus role-tagged details.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: UserId,
    /// Role-specific details; the tag is the account role.
    pub details: RoleProfile,
    pub is_verified: bool,
    /// Explicit seller rate, if one was configured.
    pub commission_rate: Option<CommissionRate>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// The account role.
    #[must_use]
    pub const fn role(&self) -> UserRole {
        self.details.role()
    }

    /// Rate applied to this seller's sales, falling back to `default`.
    #[must_use]
    pub fn effective_commission_rate(&self, default: CommissionRate) -> CommissionRate {
        self.commission_rate.unwrap_or(default)
    }
}

/// An issued API token (the secret itself is never stored).
#[derive(Debug, Clone, Serialize)]
pub struct ApiToken {
    pub id: ApiTokenId,
    pub user_id: UserId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}
