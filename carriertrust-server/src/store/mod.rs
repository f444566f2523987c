//! Record store abstraction for companies, reviews and the admin capability.
//!
//! The `RecordStore` trait is the boundary to durable storage. Backends:
//! - `InMemoryRepository`: maps behind a `RwLock`, lost on restart
//! - `SqliteRepository`: persistent, schema-versioned
//!
//! `PolicyStore` wraps any backend with the row-level permission policy for a
//! single caller.

mod memory;
mod policy;
mod sqlite;

pub use memory::InMemoryRepository;
pub use policy::PolicyStore;
pub use sqlite::SqliteRepository;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use carriertrust_core::{
    Company, CompanyId, NewCompany, NewReview, ParseEnumError, Review, ReviewEdit, ReviewId,
    ReviewStatus, ReviewWithCompany, UserId, VatId,
};

/// Errors surfaced by record store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("{operation} failed: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },
    /// The row the operation targets does not exist (or is not visible).
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    /// The permission policy rejected the operation for this caller.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    /// A stored row could not be decoded.
    #[error("corrupt {0} in record store")]
    Corruption(&'static str),
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption(what)
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

/// Which statuses a review listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Only(ReviewStatus),
    All,
}

impl StatusFilter {
    pub fn admits(&self, status: ReviewStatus) -> bool {
        match self {
            Self::Only(wanted) => *wanted == status,
            Self::All => true,
        }
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Only(ReviewStatus::Pending)
    }
}

impl FromStr for StatusFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Only(status) => write!(f, "{}", status),
            Self::All => f.write_str("all"),
        }
    }
}

/// Parameters for listing reviews, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    pub status: StatusFilter,
    pub company_id: Option<CompanyId>,
    pub limit: Option<usize>,
}

impl ReviewQuery {
    pub fn with_status(status: StatusFilter) -> Self {
        Self {
            status,
            company_id: None,
            limit: None,
        }
    }

    pub fn for_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn admits(&self, review: &Review) -> bool {
        self.status.admits(review.status)
            && self
                .company_id
                .as_ref()
                .map_or(true, |id| *id == review.company_id)
    }
}

/// Storage backend for the directory.
///
/// Backends apply no permission checks of their own; wrap them in
/// [`PolicyStore`] before serving a caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact match on the normalized VAT identifier.
    async fn find_company_by_vat(&self, vat: &VatId) -> Result<Option<Company>, StoreError>;

    /// First company (in creation order) whose name contains `fragment`,
    /// compared case-insensitively.
    async fn find_company_by_name(&self, fragment: &str) -> Result<Option<Company>, StoreError>;

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, StoreError>;

    /// Insert a company, or return the existing one with the same VAT.
    ///
    /// The lookup and insert are atomic with respect to other callers, so two
    /// concurrent submissions for an unseen VAT yield a single company.
    async fn create_company_or_fetch(&self, company: NewCompany) -> Result<Company, StoreError>;

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError>;

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError>;

    /// Reviews joined with their company, newest first.
    async fn list_reviews(&self, query: &ReviewQuery)
        -> Result<Vec<ReviewWithCompany>, StoreError>;

    /// Fails with `NotFound` if the review does not exist.
    async fn update_review_status(
        &self,
        id: &ReviewId,
        status: ReviewStatus,
    ) -> Result<(), StoreError>;

    /// Fails with `NotFound` if the review does not exist.
    async fn update_review_content(&self, id: &ReviewId, edit: &ReviewEdit)
        -> Result<(), StoreError>;

    /// Remove a review, returning the removed row if it existed.
    async fn delete_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError>;

    async fn is_admin(&self, user: &UserId) -> Result<bool, StoreError>;

    async fn set_admin(&self, user: &UserId, is_admin: bool) -> Result<(), StoreError>;
}
