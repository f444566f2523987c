//! Review lifecycle manager.
//!
//! Each operation loads the review's current state, asks the pure
//! `transition` function what to do, and executes the returned effects in
//! order against the caller's `PolicyStore` and the notifier.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use carriertrust_core::lifecycle::{transition, Delivery, Effect, Event, LifecycleState};
use carriertrust_core::{NewReview, ReviewDraft, ReviewEdit, ReviewId, ReviewStatus};

use crate::company::CompanyResolver;
use crate::error::AppError;
use crate::notifier::{Notification, Notifier};
use crate::session::Session;
use crate::store::{PolicyStore, RecordStore, StoreError};

pub const SUBMITTED_MESSAGE: &str =
    "Your review has been submitted successfully and is pending moderation.";

/// Returned to the author after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub review_id: ReviewId,
    pub status: ReviewStatus,
    pub message: &'static str,
}

/// Result of an administrator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub review_id: ReviewId,
    pub status: LifecycleState,
    /// Set when the action succeeded but its email did not go out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct ReviewLifecycle {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReviewLifecycle {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    fn store_for(&self, session: &Session) -> PolicyStore {
        PolicyStore::for_caller(self.store.clone(), session.user_id().cloned())
    }

    /// Validate and store a new pending review, then notify the administrator
    /// in the background.
    pub async fn submit(
        &self,
        session: &Session,
        draft: ReviewDraft,
    ) -> Result<SubmissionReceipt, AppError> {
        let author = session.require_user()?;
        let submission = draft.validate()?;
        let result = transition(LifecycleState::Absent, Event::Submitted)?;

        let store = self.store_for(session);
        let company_id = CompanyResolver::new(&store)
            .resolve_company(
                &submission.company_name,
                submission.vat.as_str(),
                &submission.country,
            )
            .await?;

        let review = store
            .insert_review(NewReview {
                company_id,
                author_id: author.id.clone(),
                author_email: author.email.clone(),
                rating: submission.rating,
                issue: submission.issue,
                body: submission.body,
                status: ReviewStatus::Pending,
            })
            .await?;
        info!("Review {} submitted by {}", review.id, author.id);

        self.execute_effects(&store, &review.id, result.effects)
            .await?;

        Ok(SubmissionReceipt {
            review_id: review.id,
            status: review.status,
            message: SUBMITTED_MESSAGE,
        })
    }

    /// Publish a pending review and tell its author. Approving an already
    /// published review only resends the email.
    pub async fn approve(
        &self,
        session: &Session,
        id: &ReviewId,
    ) -> Result<TransitionOutcome, AppError> {
        self.apply(session, id, Event::Approved, "Approved").await
    }

    /// Overwrite issue category, rating and body. Status is unchanged.
    pub async fn edit(
        &self,
        session: &Session,
        id: &ReviewId,
        edit: ReviewEdit,
    ) -> Result<TransitionOutcome, AppError> {
        self.apply(session, id, Event::Edited(edit), "Edited").await
    }

    /// Tell the author, then remove the review. A failed email does not stop
    /// the removal.
    pub async fn delete(
        &self,
        session: &Session,
        id: &ReviewId,
    ) -> Result<TransitionOutcome, AppError> {
        self.apply(session, id, Event::DeleteRequested, "Deleted")
            .await
    }

    async fn apply(
        &self,
        session: &Session,
        id: &ReviewId,
        event: Event,
        action: &str,
    ) -> Result<TransitionOutcome, AppError> {
        let admin = session.require_admin()?;
        let store = self.store_for(session);

        let review = store
            .get_review(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        let event_name = event.log_summary();
        let result = transition(LifecycleState::from(review.status), event)?;
        info!(
            "Review {}: {} by {} ({} -> {})",
            id, event_name, admin.id, review.status, result.state
        );

        let warning = self
            .execute_effects(&store, id, result.effects)
            .await?
            .map(|reason| format!("{}, but email failed: {}", action, reason));

        Ok(TransitionOutcome {
            review_id: id.clone(),
            status: result.state,
            warning,
        })
    }

    /// Execute effects in order.
    ///
    /// A store failure aborts the remaining effects. A failed reported
    /// notification is returned as the warning reason; detached notifications
    /// only log.
    async fn execute_effects(
        &self,
        store: &PolicyStore,
        id: &ReviewId,
        effects: Vec<Effect>,
    ) -> Result<Option<String>, StoreError> {
        let mut warning = None;

        for effect in effects {
            match effect {
                Effect::SetStatus { status } => store.update_review_status(id, status).await?,

                Effect::OverwriteContent { edit } => {
                    store.update_review_content(id, &edit).await?
                }

                Effect::Notify {
                    notification,
                    delivery,
                } => {
                    let notification = Notification::new(id.clone(), notification);
                    match delivery {
                        Delivery::Detached => self.spawn_notification(notification),
                        Delivery::Reported => {
                            if let Err(e) = self.notifier.notify(&notification).await {
                                warn!("Notification for review {} failed: {}", id, e);
                                warning = Some(e.to_string());
                            }
                        }
                    }
                }

                Effect::Remove => {
                    if store.delete_review(id).await?.is_none() {
                        return Err(StoreError::not_found("review"));
                    }
                }
            }
        }

        Ok(warning)
    }

    fn spawn_notification(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                error!(
                    "Background notification for review {} failed: {}",
                    notification.review_id(),
                    e
                );
            }
        });
    }
}
