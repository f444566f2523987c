//! Public browsing: company search and company detail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use carriertrust_core::{
    Company, CompanyId, IssueCategory, Rating, RatingSummary, Review, ReviewId, ReviewStatus,
    VatId,
};

use crate::error::AppError;
use crate::store::{PolicyStore, RecordStore, ReviewQuery, StatusFilter};

pub const EMPTY_QUERY_MESSAGE: &str = "Enter a company name or VAT number.";
pub const NO_COMPANY_MESSAGE: &str = "No company found. Try a different name or VAT number.";

/// A published review as shown to the public. Author details are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicReview {
    pub id: ReviewId,
    pub rating: Rating,
    pub issue: IssueCategory,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for PublicReview {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            rating: review.rating,
            issue: review.issue,
            body: review.body,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyDetail {
    pub company: Company,
    pub reviews: Vec<PublicReview>,
    pub summary: RatingSummary,
}

pub struct PublicDirectory {
    store: PolicyStore,
}

impl PublicDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store: PolicyStore::anonymous(store),
        }
    }

    /// Exact VAT match first, then the first company whose name contains the
    /// query (case-insensitive).
    pub async fn search(&self, query: &str) -> Result<Company, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation(EMPTY_QUERY_MESSAGE.to_string()));
        }

        if let Some(company) = self
            .store
            .find_company_by_vat(&VatId::normalize(query))
            .await?
        {
            return Ok(company);
        }

        self.store
            .find_company_by_name(query)
            .await?
            .ok_or_else(|| AppError::NotFound(NO_COMPANY_MESSAGE.to_string()))
    }

    /// The company with its published reviews (newest first) and their
    /// rating summary.
    pub async fn company_detail(&self, id: &CompanyId) -> Result<CompanyDetail, AppError> {
        let company = self
            .store
            .get_company(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;

        let rows = self
            .store
            .list_reviews(
                &ReviewQuery::with_status(StatusFilter::Only(ReviewStatus::Published))
                    .for_company(id.clone()),
            )
            .await?;

        let reviews: Vec<PublicReview> = rows
            .into_iter()
            .map(|row| PublicReview::from(row.review))
            .collect();
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));

        Ok(CompanyDetail {
            company,
            reviews,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use carriertrust_core::{NewCompany, NewReview, UserId};

    async fn company(store: &dyn RecordStore, name: &str, vat: &str) -> Company {
        store
            .create_company_or_fetch(NewCompany {
                name: name.to_string(),
                vat: VatId::from(vat),
                country: "Latvia".to_string(),
            })
            .await
            .unwrap()
    }

    async fn review(store: &dyn RecordStore, company: &Company, rating: i64, status: ReviewStatus) {
        store
            .insert_review(NewReview {
                company_id: company.id.clone(),
                author_id: UserId::from("u1"),
                author_email: Some("u1@example.com".to_string()),
                rating: Rating::new(rating).unwrap(),
                issue: IssueCategory::NonPayment,
                body: "text".to_string(),
                status,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_vat_match_beats_name_match() {
        let store = Arc::new(InMemoryRepository::new());
        company(store.as_ref(), "Carrier LV1234 Holdings", "EE9").await;
        let acme = company(store.as_ref(), "Acme Freight", "LV1234").await;

        let found = PublicDirectory::new(store).search("LV1234").await.unwrap();
        assert_eq!(found.id, acme.id);
    }

    #[tokio::test]
    async fn test_search_falls_back_to_name_and_trims() {
        let store = Arc::new(InMemoryRepository::new());
        let acme = company(store.as_ref(), "Acme Freight", "LV1234").await;
        let directory = PublicDirectory::new(store);

        assert_eq!(directory.search("  freight ").await.unwrap().id, acme.id);
        assert_eq!(directory.search("lv1234").await.unwrap().id, acme.id);
        assert!(matches!(
            directory.search("   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            directory.search("nobody").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_counts_only_published_reviews() {
        let store = Arc::new(InMemoryRepository::new());
        let acme = company(store.as_ref(), "Acme Freight", "LV1234").await;
        for rating in [5, 4, 5, 3] {
            review(store.as_ref(), &acme, rating, ReviewStatus::Published).await;
        }
        review(store.as_ref(), &acme, 1, ReviewStatus::Pending).await;

        let detail = PublicDirectory::new(store)
            .company_detail(&acme.id)
            .await
            .unwrap();
        assert_eq!(detail.reviews.len(), 4);
        assert_eq!(detail.summary.count, 4);
        assert_eq!(detail.summary.average, 4.3);
    }

    #[tokio::test]
    async fn test_detail_without_reviews_averages_zero() {
        let store = Arc::new(InMemoryRepository::new());
        let acme = company(store.as_ref(), "Acme Freight", "LV1234").await;
        let detail = PublicDirectory::new(store)
            .company_detail(&acme.id)
            .await
            .unwrap();
        assert_eq!(detail.summary.count, 0);
        assert_eq!(detail.summary.average, 0.0);
    }

    #[tokio::test]
    async fn test_detail_for_unknown_company() {
        let store = Arc::new(InMemoryRepository::new());
        assert!(matches!(
            PublicDirectory::new(store)
                .company_detail(&CompanyId::from("nope"))
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
