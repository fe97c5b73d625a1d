//! Domain events, the post-commit dispatcher, and the notification inbox.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

use atelier_core::{
    ApplicationId, ApplicationStatus, Money, NotificationId, NotificationKind, OrderId,
    OrderStatus, Page, UserId, UserRole,
};

use super::ServiceError;
use crate::db::NotificationRepository;
use crate::db::notifications::{NewNotification, NotificationFilter};
use crate::models::{Notification, RelatedObject};

/// Something that happened and that users should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    ApplicationDecided {
        user_id: UserId,
        application_id: ApplicationId,
        requested_role: UserRole,
        status: ApplicationStatus,
        notes: Option<String>,
    },
    OrderStatusChanged {
        buyer_id: UserId,
        order_id: OrderId,
        status: OrderStatus,
    },
    OrderCancelled {
        buyer_id: UserId,
        order_id: OrderId,
        sellers: Vec<UserId>,
        refunded: Option<Money>,
    },
    /// Emitted once per seller credited by a settlement.
    OrderSettled {
        seller_id: UserId,
        order_id: OrderId,
        amount: Money,
    },
    PaymentConfirmed {
        buyer_id: UserId,
        order_id: OrderId,
        amount: Money,
    },
}

fn with_article(role: UserRole) -> String {
    match role {
        UserRole::Artist => format!("an {role}"),
        _ => format!("a {role}"),
    }
}

fn order_ref(order_id: OrderId) -> Option<RelatedObject> {
    Some(RelatedObject {
        kind: "order".to_owned(),
        id: order_id.as_i32(),
    })
}

impl DomainEvent {
    /// Notifications this event produces.
    #[must_use]
    pub fn notifications(&self) -> Vec<NewNotification> {
        match self {
            Self::ApplicationDecided {
                user_id,
                application_id,
                requested_role,
                status,
                notes,
            } => {
                let role = with_article(*requested_role);
                let (title, message) = if *status == ApplicationStatus::Approved {
                    (
                        "Your seller application has been approved!".to_owned(),
                        format!(
                            "Congratulations! Your application to become {role} has been approved."
                        ),
                    )
                } else {
                    (
                        "Your seller application was not approved".to_owned(),
                        format!(
                            "We're sorry, but your application to become {role} was not approved at this time."
                        ),
                    )
                };
                let message = match notes.as_deref().map(str::trim) {
                    Some(n) if !n.is_empty() => format!("{message}\n\nAdmin notes: {n}"),
                    _ => message,
                };
                vec![NewNotification {
                    user_id: *user_id,
                    kind: NotificationKind::System,
                    title,
                    message,
                    related: Some(RelatedObject::seller_application(*application_id)),
                }]
            }
            Self::OrderStatusChanged {
                buyer_id,
                order_id,
                status,
            } => vec![NewNotification {
                user_id: *buyer_id,
                kind: NotificationKind::Order,
                title: format!("Order #{order_id} is now {status}"),
                message: format!("Your order #{order_id} has been updated to '{status}'."),
                related: order_ref(*order_id),
            }],
            Self::OrderCancelled {
                buyer_id,
                order_id,
                sellers,
                refunded,
            } => {
                let mut message = format!("Order #{order_id} has been cancelled.");
                if let Some(amount) = refunded {
                    message.push_str(&format!(" {amount} has been refunded to your wallet."));
                }
                let mut out = vec![NewNotification {
                    user_id: *buyer_id,
                    kind: NotificationKind::Order,
                    title: format!("Order #{order_id} cancelled"),
                    message,
                    related: order_ref(*order_id),
                }];
                out.extend(sellers.iter().map(|seller_id| NewNotification {
                    user_id: *seller_id,
                    kind: NotificationKind::Order,
                    title: format!("Order #{order_id} cancelled"),
                    message: format!(
                        "The buyer cancelled order #{order_id}. Reserved stock has been restored."
                    ),
                    related: order_ref(*order_id),
                }));
                out
            }
            Self::OrderSettled {
                seller_id,
                order_id,
                amount,
            } => vec![NewNotification {
                user_id: *seller_id,
                kind: NotificationKind::Payment,
                title: format!("Payout for order #{order_id}"),
                message: format!("{amount} from order #{order_id} has been credited to your wallet."),
                related: order_ref(*order_id),
            }],
            Self::PaymentConfirmed {
                buyer_id,
                order_id,
                amount,
            } => vec![NewNotification {
                user_id: *buyer_id,
                kind: NotificationKind::Payment,
                title: format!("Payment received for order #{order_id}"),
                message: format!("We received your payment of {amount} for order #{order_id}."),
                related: order_ref(*order_id),
            }],
        }
    }
}

/// Writes notifications for events after the originating transaction commits.
///
/// Failures are logged and never propagated.
#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: PgPool,
}

impl NotificationDispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store the notifications for one event.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, event: DomainEvent) {
        let repo = NotificationRepository::new(&self.pool);
        for new in event.notifications() {
            match repo.create(&new).await {
                Ok(n) => debug!(notification_id = %n.id, user_id = %n.user_id, "Stored notification"),
                Err(e) => error!(error = %e, user_id = %new.user_id, "Failed to store notification"),
            }
        }
    }

    /// Store the notifications for several events, in order.
    pub async fn dispatch_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.dispatch(event).await;
        }
    }
}

/// A page of notifications plus the user's unread total.
#[derive(Debug, Serialize)]
pub struct NotificationList {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread_count: i64,
}

/// The user-facing notification inbox.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List the user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        kind: Option<NotificationKind>,
        is_read: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<NotificationList, ServiceError> {
        let (page, unread_count) = NotificationRepository::new(&self.pool)
            .list(user_id, NotificationFilter { kind, is_read }, limit, offset)
            .await?;
        Ok(NotificationList { page, unread_count })
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user has no such notification.
    pub async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<(), ServiceError> {
        if NotificationRepository::new(&self.pool)
            .mark_read(user_id, id)
            .await?
        {
            Ok(())
        } else {
            Err(ServiceError::not_found("notification"))
        }
    }

    /// Mark all of the user's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the update fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, ServiceError> {
        Ok(NotificationRepository::new(&self.pool)
            .mark_all_read(user_id)
            .await?)
    }
}
