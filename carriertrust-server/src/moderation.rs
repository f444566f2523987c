//! Moderation console listing.

use std::sync::Arc;

use carriertrust_core::ReviewWithCompany;

use crate::error::AppError;
use crate::session::Session;
use crate::store::{PolicyStore, RecordStore, ReviewQuery, StatusFilter};

/// The console only ever sees this many of the newest matching reviews.
pub const MODERATION_PAGE_LIMIT: usize = 200;

pub struct ModerationConsole {
    store: Arc<dyn RecordStore>,
}

impl ModerationConsole {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Newest reviews in `filter`, narrowed by `search` over company name,
    /// VAT and review text. The search only filters the fetched page.
    pub async fn list(
        &self,
        session: &Session,
        filter: StatusFilter,
        search: Option<&str>,
    ) -> Result<Vec<ReviewWithCompany>, AppError> {
        session.require_admin()?;
        let store = PolicyStore::for_caller(self.store.clone(), session.user_id().cloned());

        let mut rows = store
            .list_reviews(&ReviewQuery::with_status(filter).limit(MODERATION_PAGE_LIMIT))
            .await?;

        if let Some(term) = search {
            rows.retain(|row| row.matches_term(term));
        }
        Ok(rows)
    }
}
