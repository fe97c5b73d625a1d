//! Seller onboarding: applications and admin decisions.
//!
//! A decision locks the application row and writes the application, the
//! applicant's profile and the admin activity entry in one transaction; the
//! applicant is notified after commit.

use sqlx::PgPool;
use tracing::{info, instrument};

use atelier_core::{
    AdminAction, ApplicationId, ApplicationStatus, Decision, Page, UserId, UserRole,
};

use super::notifications::{DomainEvent, NotificationDispatcher};
use super::ServiceError;
use crate::db::{ApplicationRepository, activities, applications, users};
use crate::models::{ApplicationPayload, RelatedObject, SellerApplication};

const MAX_NOTES_LENGTH: usize = 2000;

/// Seller application workflow.
#[derive(Clone)]
pub struct OnboardingService {
    pool: PgPool,
    dispatcher: NotificationDispatcher,
}

impl OnboardingService {
    /// Create a new onboarding service.
    #[must_use]
    pub const fn new(pool: PgPool, dispatcher: NotificationDispatcher) -> Self {
        Self { pool, dispatcher }
    }

    /// Submit an application to become a seller.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the requested role is not a
    /// seller role, the details do not match it, or the terms were not
    /// accepted. Returns `ServiceError::Conflict` if the user already sells
    /// or has a pending application.
    #[instrument(skip(self, payload), fields(user_id = %user_id, role = %requested_role))]
    pub async fn submit_application(
        &self,
        user_id: UserId,
        requested_role: UserRole,
        mut payload: ApplicationPayload,
    ) -> Result<SellerApplication, ServiceError> {
        if !requested_role.is_seller() {
            return Err(ServiceError::validation(format!(
                "'{requested_role}' is not a seller role"
            )));
        }
        payload.details = payload.details.normalized()?;
        payload.details.expect_role(requested_role)?;
        if !payload.terms_accepted {
            return Err(ServiceError::validation("terms must be accepted"));
        }

        let mut tx = self.pool.begin().await?;

        let profile = users::lock_profile(&mut *tx, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile"))?;
        if profile.role().is_seller() {
            return Err(ServiceError::Conflict(format!(
                "already registered as {}",
                profile.role()
            )));
        }
        if applications::has_pending(&mut *tx, user_id).await? {
            return Err(ServiceError::Conflict(
                "an application is already pending".to_owned(),
            ));
        }

        let application = applications::insert(&mut *tx, user_id, &payload).await?;
        tx.commit().await?;

        info!(application_id = %application.id, "Submitted seller application");
        Ok(application)
    }

    /// The user's most recent application, if any.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn application_status(
        &self,
        user_id: UserId,
    ) -> Result<Option<SellerApplication>, ServiceError> {
        Ok(ApplicationRepository::new(&self.pool)
            .latest_for_user(user_id)
            .await?)
    }

    /// Approve or reject a pending application.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the application does not exist and
    /// `ServiceError::Conflict` if it has already been decided.
    #[instrument(skip(self, notes), fields(admin_id = %admin_id, application_id = %application_id))]
    pub async fn decide_application(
        &self,
        admin_id: UserId,
        application_id: ApplicationId,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<SellerApplication, ServiceError> {
        let notes = notes
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(ServiceError::validation(format!(
                "notes must be at most {MAX_NOTES_LENGTH} characters"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let application = applications::lock(&mut *tx, application_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("application"))?;
        let status = application
            .status
            .decide(decision)
            .map_err(|e| ServiceError::Conflict(e.to_string()))?;

        let decided = applications::record_decision(
            &mut *tx,
            application_id,
            status,
            admin_id,
            notes.as_deref(),
        )
        .await?;

        if status == ApplicationStatus::Approved {
            users::assign_role(&mut *tx, decided.user_id, &decided.payload.details).await?;
        }
        activities::record(
            &mut *tx,
            admin_id,
            AdminAction::for_decision(decision),
            &format!(
                "{} application #{application_id} to sell as {}",
                match decision {
                    Decision::Approved => "Approved",
                    Decision::Rejected => "Rejected",
                },
                decided.requested_role
            ),
            Some(&RelatedObject::seller_application(application_id)),
        )
        .await?;

        tx.commit().await?;
        info!(status = %status, user_id = %decided.user_id, "Decided seller application");

        self.dispatcher
            .dispatch(DomainEvent::ApplicationDecided {
                user_id: decided.user_id,
                application_id: decided.id,
                requested_role: decided.requested_role,
                status,
                notes,
            })
            .await;

        Ok(decided)
    }

    /// List applications for review.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<SellerApplication>, ServiceError> {
        Ok(ApplicationRepository::new(&self.pool)
            .list(status, limit, offset)
            .await?)
    }

    /// Get one application.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if it does not exist.
    pub async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<SellerApplication, ServiceError> {
        ApplicationRepository::new(&self.pool)
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("application"))
    }
}
