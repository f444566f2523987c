//! Tests for SQLite repository implementation.

use std::sync::Arc;

use rusqlite::params;

use super::super::{RecordStore, ReviewQuery, StatusFilter, StoreError};
use super::{SqliteRepository, CURRENT_SCHEMA_VERSION};
use carriertrust_core::{
    CompanyId, IssueCategory, NewCompany, NewReview, Rating, ReviewEdit, ReviewId, ReviewStatus,
    UserId, VatId,
};

use proptest::prelude::*;

fn new_company(name: &str, vat: &str) -> NewCompany {
    NewCompany {
        name: name.to_string(),
        vat: VatId::from(vat),
        country: "Latvia".to_string(),
    }
}

fn new_review(company_id: &CompanyId, rating: i64, status: ReviewStatus) -> NewReview {
    NewReview {
        company_id: company_id.clone(),
        author_id: UserId::from("author-1"),
        author_email: Some("author@example.com".to_string()),
        rating: Rating::new(rating).unwrap(),
        issue: IssueCategory::NonPayment,
        body: format!("rating {}", rating),
        status,
    }
}

#[tokio::test]
async fn test_get_returns_none_for_missing() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    assert!(repo
        .get_review(&ReviewId::from("nope"))
        .await
        .unwrap()
        .is_none());
    assert!(repo
        .get_company(&CompanyId::from("nope"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_company_then_find_by_vat() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let created = repo
        .create_company_or_fetch(new_company("Baltic Freight", "lv40003000000"))
        .await
        .unwrap();

    assert_eq!(created.vat.as_str(), "LV40003000000");
    let found = repo
        .find_company_by_vat(&VatId::from("LV40003000000"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn test_create_company_or_fetch_returns_existing() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let first = repo
        .create_company_or_fetch(new_company("Baltic Freight", "LV1"))
        .await
        .unwrap();
    let second = repo
        .create_company_or_fetch(new_company("Another Name", "LV1"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Baltic Freight");
}

#[tokio::test]
async fn test_concurrent_creation_yields_one_company() {
    let repo = Arc::new(SqliteRepository::new_in_memory().unwrap());
    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.create_company_or_fetch(new_company(&format!("Carrier {}", i), "EE999"))
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let conn = repo.conn.lock().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM companies WHERE vat_uid = 'EE999'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_find_company_by_name_is_case_insensitive() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let first = repo
        .create_company_or_fetch(new_company("Riga Logistics", "LV1"))
        .await
        .unwrap();
    repo.create_company_or_fetch(new_company("Logistics Riga", "LV2"))
        .await
        .unwrap();

    let found = repo.find_company_by_name("LOGISTICS").await.unwrap().unwrap();
    assert_eq!(found.id, first.id);

    let unicode = repo
        .create_company_or_fetch(new_company("Šiauliai Transportas", "LT3"))
        .await
        .unwrap();
    let found = repo.find_company_by_name("šIAULIAI").await.unwrap().unwrap();
    assert_eq!(found.id, unicode.id);

    assert!(repo.find_company_by_name("nowhere").await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_and_get_review() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let company = repo
        .create_company_or_fetch(new_company("Acme", "LV1"))
        .await
        .unwrap();
    let inserted = repo
        .insert_review(new_review(&company.id, 4, ReviewStatus::Pending))
        .await
        .unwrap();

    let fetched = repo.get_review(&inserted.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, inserted.id);
    assert_eq!(fetched.rating.get(), 4);
    assert_eq!(fetched.status, ReviewStatus::Pending);
    assert_eq!(fetched.author_email.as_deref(), Some("author@example.com"));
}

#[tokio::test]
async fn test_insert_review_for_missing_company_fails() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let err = repo
        .insert_review(new_review(
            &CompanyId::from("ghost"),
            3,
            ReviewStatus::Pending,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
}

#[tokio::test]
async fn test_list_reviews_filters_joins_and_orders() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let acme = repo
        .create_company_or_fetch(new_company("Acme", "LV1"))
        .await
        .unwrap();
    let other = repo
        .create_company_or_fetch(new_company("Other", "EE2"))
        .await
        .unwrap();

    let oldest = repo
        .insert_review(new_review(&acme.id, 1, ReviewStatus::Pending))
        .await
        .unwrap();
    repo.insert_review(new_review(&acme.id, 5, ReviewStatus::Published))
        .await
        .unwrap();
    let newest = repo
        .insert_review(new_review(&other.id, 2, ReviewStatus::Pending))
        .await
        .unwrap();

    let pending = repo
        .list_reviews(&ReviewQuery::with_status(StatusFilter::default()))
        .await
        .unwrap();
    let ids: Vec<_> = pending.iter().map(|r| r.review.id.clone()).collect();
    assert_eq!(ids, vec![newest.id.clone(), oldest.id.clone()]);
    assert_eq!(pending[0].company_name, "Other");
    assert_eq!(pending[0].company_vat.as_str(), "EE2");

    let all_for_acme = repo
        .list_reviews(&ReviewQuery::with_status(StatusFilter::All).for_company(acme.id.clone()))
        .await
        .unwrap();
    assert_eq!(all_for_acme.len(), 2);

    let limited = repo
        .list_reviews(&ReviewQuery::with_status(StatusFilter::All).limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].review.id, newest.id);
}

#[tokio::test]
async fn test_list_reviews_skips_corrupt_rows() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let company = repo
        .create_company_or_fetch(new_company("Acme", "LV1"))
        .await
        .unwrap();
    let good = repo
        .insert_review(new_review(&company.id, 3, ReviewStatus::Pending))
        .await
        .unwrap();
    let bad = repo
        .insert_review(new_review(&company.id, 4, ReviewStatus::Pending))
        .await
        .unwrap();

    {
        let conn = repo.conn.lock().unwrap();
        conn.execute(
            "UPDATE reviews SET issue_type = 'mystery' WHERE id = ?1",
            params![bad.id.as_str()],
        )
        .unwrap();
    }

    let listed = repo
        .list_reviews(&ReviewQuery::with_status(StatusFilter::All))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].review.id, good.id);

    let err = repo.get_review(&bad.id).await.unwrap_err();
    assert_eq!(err, StoreError::corruption("review issue type"));
}

#[tokio::test]
async fn test_update_status_and_content() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let company = repo
        .create_company_or_fetch(new_company("Acme", "LV1"))
        .await
        .unwrap();
    let review = repo
        .insert_review(new_review(&company.id, 2, ReviewStatus::Pending))
        .await
        .unwrap();

    repo.update_review_status(&review.id, ReviewStatus::Published)
        .await
        .unwrap();
    repo.update_review_content(
        &review.id,
        &ReviewEdit {
            issue: IssueCategory::Fraud,
            rating: Rating::new(1).unwrap(),
            body: "rewritten".to_string(),
        },
    )
    .await
    .unwrap();

    let fetched = repo.get_review(&review.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, ReviewStatus::Published);
    assert_eq!(fetched.issue, IssueCategory::Fraud);
    assert_eq!(fetched.rating.get(), 1);
    assert_eq!(fetched.body, "rewritten");
    assert_eq!(fetched.created_at, review.created_at);
}

#[tokio::test]
async fn test_updates_on_missing_review_are_not_found() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let missing = ReviewId::from("missing");
    assert_eq!(
        repo.update_review_status(&missing, ReviewStatus::Published)
            .await
            .unwrap_err(),
        StoreError::not_found("review")
    );
    assert!(repo.delete_review(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_review_returns_removed_row() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let company = repo
        .create_company_or_fetch(new_company("Acme", "LV1"))
        .await
        .unwrap();
    let review = repo
        .insert_review(new_review(&company.id, 5, ReviewStatus::Published))
        .await
        .unwrap();

    let removed = repo.delete_review(&review.id).await.unwrap().unwrap();
    assert_eq!(removed.id, review.id);
    assert!(repo.get_review(&review.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_flag_roundtrip() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let user = UserId::from("u1");
    assert!(!repo.is_admin(&user).await.unwrap());
    repo.set_admin(&user, true).await.unwrap();
    assert!(repo.is_admin(&user).await.unwrap());
    repo.set_admin(&user, false).await.unwrap();
    assert!(!repo.is_admin(&user).await.unwrap());
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!("carriertrust-test-{}", uuid::Uuid::new_v4()));
    let path = dir.join("carriertrust.db");

    let company_id = {
        let repo = SqliteRepository::new(&path).unwrap();
        let company = repo
            .create_company_or_fetch(new_company("Acme", "LV1"))
            .await
            .unwrap();
        repo.set_admin(&UserId::from("admin"), true).await.unwrap();
        company.id
    };

    let repo = SqliteRepository::new(&path).unwrap();
    assert!(repo.get_company(&company_id).await.unwrap().is_some());
    assert!(repo.is_admin(&UserId::from("admin")).await.unwrap());

    drop(repo);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_schema_version_is_recorded() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let conn = repo.conn.lock().unwrap();
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_rejects_newer_schema() {
    let dir = std::env::temp_dir().join(format!("carriertrust-test-{}", uuid::Uuid::new_v4()));
    let path = dir.join("carriertrust.db");
    {
        let repo = SqliteRepository::new(&path).unwrap();
        let conn = repo.conn.lock().unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1 WHERE id = 1",
            params![CURRENT_SCHEMA_VERSION + 1],
        )
        .unwrap();
    }

    assert!(SqliteRepository::new(&path).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unique_vat_index_enforced() {
    let repo = SqliteRepository::new_in_memory().unwrap();
    let conn = repo.conn.lock().unwrap();
    conn.execute(
        "INSERT INTO companies (id, name, vat_uid, country, created_at)
         VALUES ('a', 'A', 'LV1', 'Latvia', '2024-01-01T00:00:00.000000Z')",
        [],
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO companies (id, name, vat_uid, country, created_at)
         VALUES ('b', 'B', 'LV1', 'Latvia', '2024-01-01T00:00:00.000000Z')",
        [],
    );
    assert!(duplicate.is_err());
}

proptest! {
    #[test]
    fn prop_rating_survives_storage(rating in 1i64..=5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let stored = rt.block_on(async {
            let repo = SqliteRepository::new_in_memory().unwrap();
            let company = repo
                .create_company_or_fetch(new_company("Acme", "LV1"))
                .await
                .unwrap();
            let review = repo
                .insert_review(new_review(&company.id, rating, ReviewStatus::Published))
                .await
                .unwrap();
            repo.get_review(&review.id).await.unwrap().unwrap().rating
        });
        prop_assert_eq!(i64::from(stored.get()), rating);
    }
}
