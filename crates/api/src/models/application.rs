//! Seller application domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{ApplicationId, ApplicationStatus, CategoryId, Money, RoleProfile, UserId, UserRole};

/// What an applicant submits for review.
///
/// `details` carries the role-specific profile fields that become the
/// applicant's profile on approval; its tag is the requested role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPayload {
    pub details: RoleProfile,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub social_media: Option<String>,
    #[serde(default)]
    pub portfolio_link: Option<String>,
    /// Categories the seller intends to list in.
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    /// Shipping cost per region name.
    #[serde(default)]
    pub shipping_costs: BTreeMap<String, Money>,
    /// References to identity or business documents, uploaded elsewhere.
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// A submitted seller application.
#[derive(Debug, Clone, Serialize)]
pub struct SellerApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub requested_role: UserRole,
    pub payload: ApplicationPayload,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
