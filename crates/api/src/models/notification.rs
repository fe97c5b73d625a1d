//! Notification domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{ApplicationId, NotificationId, NotificationKind, UserId};

/// Pointer to the object a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedObject {
    /// Object type, e.g. `order` or `seller_application`.
    pub kind: String,
    pub id: i32,
}

impl RelatedObject {
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self {
            kind: "user".to_owned(),
            id: id.as_i32(),
        }
    }

    #[must_use]
    pub fn seller_application(id: ApplicationId) -> Self {
        Self {
            kind: "seller_application".to_owned(),
            id: id.as_i32(),
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub related: Option<RelatedObject>,
    pub created_at: DateTime<Utc>,
}
