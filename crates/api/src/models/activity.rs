//! Admin activity log entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{ActivityId, AdminAction, UserId};

use super::RelatedObject;

/// A staff action, written in the same transaction as the change it
/// describes.
#[derive(Debug, Clone, Serialize)]
pub struct AdminActivity {
    pub id: ActivityId,
    pub admin_id: UserId,
    pub action: AdminAction,
    pub description: String,
    pub target: Option<RelatedObject>,
    pub created_at: DateTime<Utc>,
}
