//! In-memory implementation of `RecordStore`.
//!
//! All rows are held in memory and lost on restart. Used by tests and local
//! development.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, ReviewQuery, StoreError};
use carriertrust_core::{
    Company, CompanyId, NewCompany, NewReview, Review, ReviewEdit, ReviewId, ReviewStatus,
    ReviewWithCompany, UserId, VatId,
};

/// In-memory record store.
///
/// Companies and reviews are kept in insertion order so that "first match"
/// and "newest first" are deterministic even when timestamps collide.
pub struct InMemoryRepository {
    companies: RwLock<Vec<Company>>,
    reviews: RwLock<Vec<Review>>,
    admins: RwLock<HashSet<UserId>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            companies: RwLock::new(Vec::new()),
            reviews: RwLock::new(Vec::new()),
            admins: RwLock::new(HashSet::new()),
        }
    }

    /// Number of stored companies with the given VAT (used to verify dedup).
    pub async fn company_count_for_vat(&self, vat: &VatId) -> usize {
        let companies = self.companies.read().await;
        companies.iter().filter(|c| c.vat == *vat).count()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRepository {
    async fn find_company_by_vat(&self, vat: &VatId) -> Result<Option<Company>, StoreError> {
        let companies = self.companies.read().await;
        Ok(companies.iter().find(|c| c.vat == *vat).cloned())
    }

    async fn find_company_by_name(&self, fragment: &str) -> Result<Option<Company>, StoreError> {
        let needle = fragment.to_lowercase();
        let companies = self.companies.read().await;
        Ok(companies
            .iter()
            .find(|c| c.name.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, StoreError> {
        let companies = self.companies.read().await;
        Ok(companies.iter().find(|c| c.id == *id).cloned())
    }

    async fn create_company_or_fetch(&self, company: NewCompany) -> Result<Company, StoreError> {
        // Holding the write lock across lookup and insert serializes creation.
        let mut companies = self.companies.write().await;
        if let Some(existing) = companies.iter().find(|c| c.vat == company.vat) {
            return Ok(existing.clone());
        }
        let created = Company {
            id: CompanyId(Uuid::new_v4().to_string()),
            name: company.name,
            vat: company.vat,
            country: company.country,
            created_at: Utc::now(),
        };
        companies.push(created.clone());
        Ok(created)
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        {
            let companies = self.companies.read().await;
            if !companies.iter().any(|c| c.id == review.company_id) {
                return Err(StoreError::storage(
                    "insert_review",
                    format!("company {} does not exist", review.company_id),
                ));
            }
        }

        let created = Review {
            id: ReviewId(Uuid::new_v4().to_string()),
            company_id: review.company_id,
            author_id: review.author_id,
            author_email: review.author_email,
            rating: review.rating,
            issue: review.issue,
            body: review.body,
            status: review.status,
            created_at: Utc::now(),
        };
        let mut reviews = self.reviews.write().await;
        reviews.push(created.clone());
        Ok(created)
    }

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.iter().find(|r| r.id == *id).cloned())
    }

    async fn list_reviews(
        &self,
        query: &ReviewQuery,
    ) -> Result<Vec<ReviewWithCompany>, StoreError> {
        let companies = self.companies.read().await;
        let by_id: HashMap<&CompanyId, &Company> = companies.iter().map(|c| (&c.id, c)).collect();

        let reviews = self.reviews.read().await;
        let mut rows: Vec<ReviewWithCompany> = reviews
            .iter()
            .rev()
            .filter(|r| query.admits(r))
            .filter_map(|r| {
                let company = by_id.get(&r.company_id)?;
                Some(ReviewWithCompany {
                    review: r.clone(),
                    company_name: company.name.clone(),
                    company_vat: company.vat.clone(),
                    company_country: company.country.clone(),
                })
            })
            .collect();

        // Stable sort keeps reverse insertion order for equal timestamps.
        rows.sort_by(|a, b| b.review.created_at.cmp(&a.review.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn update_review_status(
        &self,
        id: &ReviewId,
        status: ReviewStatus,
    ) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().await;
        let review = reviews
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or(StoreError::not_found("review"))?;
        review.status = status;
        Ok(())
    }

    async fn update_review_content(
        &self,
        id: &ReviewId,
        edit: &ReviewEdit,
    ) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().await;
        let review = reviews
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or(StoreError::not_found("review"))?;
        review.issue = edit.issue;
        review.rating = edit.rating;
        review.body = edit.body.clone();
        Ok(())
    }

    async fn delete_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        let mut reviews = self.reviews.write().await;
        let position = reviews.iter().position(|r| r.id == *id);
        Ok(position.map(|pos| reviews.remove(pos)))
    }

    async fn is_admin(&self, user: &UserId) -> Result<bool, StoreError> {
        let admins = self.admins.read().await;
        Ok(admins.contains(user))
    }

    async fn set_admin(&self, user: &UserId, is_admin: bool) -> Result<(), StoreError> {
        let mut admins = self.admins.write().await;
        if is_admin {
            admins.insert(user.clone());
        } else {
            admins.remove(user);
        }
        Ok(())
    }
}
