//! Row-level permission policy for a single caller.
//!
//! Every handler reaches the record store through a `PolicyStore`, so the
//! policy holds even if a service forgets to check the session. The admin
//! flag is re-read from the backing store on every privileged call.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{RecordStore, ReviewQuery, StatusFilter, StoreError};
use carriertrust_core::{
    Company, CompanyId, NewCompany, NewReview, Review, ReviewEdit, ReviewId, ReviewStatus,
    ReviewWithCompany, UserId, VatId,
};

/// A record store as seen by one caller.
///
/// Anonymous callers and non-admins:
/// - read companies
/// - read published reviews only
/// - insert pending reviews authored by themselves (authenticated only)
///
/// Admins additionally read, update and delete reviews of any status and
/// manage the admin flag.
#[derive(Clone)]
pub struct PolicyStore {
    inner: Arc<dyn RecordStore>,
    caller: Option<UserId>,
}

impl PolicyStore {
    pub fn for_caller(inner: Arc<dyn RecordStore>, caller: Option<UserId>) -> Self {
        Self { inner, caller }
    }

    pub fn anonymous(inner: Arc<dyn RecordStore>) -> Self {
        Self::for_caller(inner, None)
    }

    async fn caller_is_admin(&self) -> Result<bool, StoreError> {
        match &self.caller {
            Some(user) => self.inner.is_admin(user).await,
            None => Ok(false),
        }
    }

    async fn require_admin(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.caller_is_admin().await? {
            Ok(())
        } else {
            warn!(
                "Denied {} for caller {}",
                operation,
                self.caller
                    .as_ref()
                    .map(|u| u.as_str())
                    .unwrap_or("<anonymous>")
            );
            Err(StoreError::PermissionDenied(operation))
        }
    }
}

#[async_trait]
impl RecordStore for PolicyStore {
    async fn find_company_by_vat(&self, vat: &VatId) -> Result<Option<Company>, StoreError> {
        self.inner.find_company_by_vat(vat).await
    }

    async fn find_company_by_name(&self, fragment: &str) -> Result<Option<Company>, StoreError> {
        self.inner.find_company_by_name(fragment).await
    }

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, StoreError> {
        self.inner.get_company(id).await
    }

    async fn create_company_or_fetch(&self, company: NewCompany) -> Result<Company, StoreError> {
        if self.caller.is_none() {
            return Err(StoreError::PermissionDenied("create company"));
        }
        self.inner.create_company_or_fetch(company).await
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        if self.caller.as_ref() != Some(&review.author_id) {
            return Err(StoreError::PermissionDenied("insert review for another user"));
        }
        if review.status != ReviewStatus::Pending {
            return Err(StoreError::PermissionDenied("insert non-pending review"));
        }
        self.inner.insert_review(review).await
    }

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        let review = self.inner.get_review(id).await?;
        match review {
            Some(r) if !r.status.is_public() => {
                self.require_admin("read unpublished review").await?;
                Ok(Some(r))
            }
            other => Ok(other),
        }
    }

    async fn list_reviews(
        &self,
        query: &ReviewQuery,
    ) -> Result<Vec<ReviewWithCompany>, StoreError> {
        if self.caller_is_admin().await? {
            return self.inner.list_reviews(query).await;
        }
        let mut public = query.clone();
        public.status = StatusFilter::Only(ReviewStatus::Published);
        self.inner.list_reviews(&public).await
    }

    async fn update_review_status(
        &self,
        id: &ReviewId,
        status: ReviewStatus,
    ) -> Result<(), StoreError> {
        self.require_admin("update review status").await?;
        self.inner.update_review_status(id, status).await
    }

    async fn update_review_content(
        &self,
        id: &ReviewId,
        edit: &ReviewEdit,
    ) -> Result<(), StoreError> {
        self.require_admin("update review content").await?;
        self.inner.update_review_content(id, edit).await
    }

    async fn delete_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        self.require_admin("delete review").await?;
        self.inner.delete_review(id).await
    }

    async fn is_admin(&self, user: &UserId) -> Result<bool, StoreError> {
        self.inner.is_admin(user).await
    }

    async fn set_admin(&self, user: &UserId, is_admin: bool) -> Result<(), StoreError> {
        self.require_admin("set admin").await?;
        self.inner.set_admin(user, is_admin).await
    }
}
