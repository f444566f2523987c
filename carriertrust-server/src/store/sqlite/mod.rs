//! SQLite implementation of `RecordStore`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{RecordStore, ReviewQuery, StatusFilter, StoreError};
use carriertrust_core::{
    Company, CompanyId, NewCompany, NewReview, Rating, Review, ReviewEdit, ReviewId, ReviewStatus,
    ReviewWithCompany, UserId, VatId,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 2;

const COMPANY_COLUMNS: &str = "id, name, vat_uid, country, created_at";

const RETURNED_REVIEW_COLUMNS: &str = "id, company_id, author_user_id, author_email, rating, \
                                       issue_type, review_text, status, created_at";

const REVIEW_COLUMNS: &str = "r.id, r.company_id, r.author_user_id, r.author_email, r.rating, \
                              r.issue_type, r.review_text, r.status, r.created_at";

/// SQLite-backed record store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for concurrent readers
    /// - `foreign_keys = ON` so reviews cannot reference missing companies
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            warn!(
                "SQLite kept journal_mode '{}' instead of 'wal' for {}",
                journal_mode, path_str
            );
        }

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| StoreError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS companies (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    vat_uid TEXT NOT NULL,
                    country TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reviews (
                    id TEXT PRIMARY KEY,
                    company_id TEXT NOT NULL REFERENCES companies(id),
                    author_user_id TEXT NOT NULL,
                    author_email TEXT,
                    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    issue_type TEXT NOT NULL,
                    review_text TEXT NOT NULL,
                    status TEXT NOT NULL CHECK (status IN ('pending', 'published', 'hidden')),
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_reviews_company
                    ON reviews(company_id, status, created_at DESC);

                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    is_admin INTEGER NOT NULL DEFAULT 0
                );
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        // Migration from version 1 to version 2: enforce one company per VAT at
        // the storage layer. Fails if a v1 database already holds duplicates;
        // merge those by hand before upgrading.
        if from_version < 2 {
            conn.execute_batch(
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_companies_vat_uid
                    ON companies(vat_uid);
                CREATE INDEX IF NOT EXISTS idx_reviews_status_created
                    ON reviews(status, created_at DESC);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v2", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::storage(operation, "connection mutex poisoned"))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::storage(operation, e.to_string()))?
    }
}

// =============================================================================
// Row conversion helpers
// =============================================================================

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::corruption("timestamp"))
}

/// Convert a usize limit to i64 for the SQLite LIMIT clause.
///
/// `None` maps to -1, which SQLite treats as "no limit".
fn limit_to_i64(limit: Option<usize>, operation: &'static str) -> Result<i64, StoreError> {
    match limit {
        None => Ok(-1),
        Some(n) => i64::try_from(n).map_err(|_| {
            StoreError::storage(
                operation,
                format!("limit {} exceeds maximum storable value ({})", n, i64::MAX),
            )
        }),
    }
}

/// A company row exactly as stored.
struct CompanyRow {
    id: String,
    name: String,
    vat_uid: String,
    country: String,
    created_at: String,
}

impl CompanyRow {
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            vat_uid: row.get(offset + 2)?,
            country: row.get(offset + 3)?,
            created_at: row.get(offset + 4)?,
        })
    }

    fn decode(self) -> Result<Company, StoreError> {
        Ok(Company {
            id: CompanyId(self.id),
            name: self.name,
            vat: VatId::from(self.vat_uid),
            country: self.country,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// A review row exactly as stored.
struct ReviewRow {
    id: String,
    company_id: String,
    author_user_id: String,
    author_email: Option<String>,
    rating: i64,
    issue_type: String,
    review_text: String,
    status: String,
    created_at: String,
}

impl ReviewRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            company_id: row.get(1)?,
            author_user_id: row.get(2)?,
            author_email: row.get(3)?,
            rating: row.get(4)?,
            issue_type: row.get(5)?,
            review_text: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Review, StoreError> {
        Ok(Review {
            id: ReviewId(self.id),
            company_id: CompanyId(self.company_id),
            author_id: UserId(self.author_user_id),
            author_email: self.author_email,
            rating: Rating::new(self.rating).ok_or(StoreError::corruption("review rating"))?,
            issue: self
                .issue_type
                .parse()
                .map_err(|_| StoreError::corruption("review issue type"))?,
            body: self.review_text,
            status: self
                .status
                .parse()
                .map_err(|_| StoreError::corruption("review status"))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn fetch_company_where(
    conn: &Connection,
    operation: &'static str,
    clause: &str,
    value: &str,
) -> Result<Option<Company>, StoreError> {
    let sql = format!(
        "SELECT {} FROM companies WHERE {} LIMIT 1",
        COMPANY_COLUMNS, clause
    );
    conn.query_row(&sql, params![value], |row| CompanyRow::read(row, 0))
        .optional()
        .map_err(|e| StoreError::storage(operation, e.to_string()))?
        .map(CompanyRow::decode)
        .transpose()
}

fn fetch_review(conn: &Connection, id: &str) -> Result<Option<Review>, StoreError> {
    let sql = format!("SELECT {} FROM reviews r WHERE r.id = ?1", REVIEW_COLUMNS);
    conn.query_row(&sql, params![id], ReviewRow::read)
        .optional()
        .map_err(|e| StoreError::storage("get_review", e.to_string()))?
        .map(ReviewRow::decode)
        .transpose()
}

// =============================================================================
// RecordStore trait implementation
// =============================================================================

#[async_trait]
impl RecordStore for SqliteRepository {
    async fn find_company_by_vat(&self, vat: &VatId) -> Result<Option<Company>, StoreError> {
        let vat = vat.as_str().to_string();
        self.with_conn("find_company_by_vat", move |conn| {
            fetch_company_where(conn, "find_company_by_vat", "vat_uid = ?1", &vat)
        })
        .await
    }

    async fn find_company_by_name(&self, fragment: &str) -> Result<Option<Company>, StoreError> {
        // SQLite's LIKE and lower() only fold ASCII, so the comparison runs here.
        // A miss scans every company row; fine for a directory of this size,
        // but needs a folded-name column with an index if the table grows.
        let needle = fragment.to_lowercase();
        self.with_conn("find_company_by_name", move |conn| {
            let sql = format!("SELECT {} FROM companies ORDER BY rowid", COMPANY_COLUMNS);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| StoreError::storage("find_company_by_name", e.to_string()))?;
            let rows = stmt
                .query_map([], |row| CompanyRow::read(row, 0))
                .map_err(|e| StoreError::storage("find_company_by_name", e.to_string()))?;

            for row in rows {
                let row =
                    row.map_err(|e| StoreError::storage("find_company_by_name", e.to_string()))?;
                if row.name.to_lowercase().contains(&needle) {
                    return row.decode().map(Some);
                }
            }
            Ok(None)
        })
        .await
    }

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>, StoreError> {
        let id = id.0.clone();
        self.with_conn("get_company", move |conn| {
            fetch_company_where(conn, "get_company", "id = ?1", &id)
        })
        .await
    }

    async fn create_company_or_fetch(&self, company: NewCompany) -> Result<Company, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = format_timestamp(&Utc::now());

        self.with_conn("create_company_or_fetch", move |conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO companies (id, name, vat_uid, country, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(vat_uid) DO NOTHING",
                    params![
                        id,
                        company.name,
                        company.vat.as_str(),
                        company.country,
                        created_at
                    ],
                )
                .map_err(|e| StoreError::storage("create_company", e.to_string()))?;

            if inserted == 0 {
                debug!("Company with VAT {} already exists", company.vat);
            }

            fetch_company_where(
                conn,
                "create_company_or_fetch",
                "vat_uid = ?1",
                company.vat.as_str(),
            )?
            .ok_or(StoreError::storage(
                "create_company_or_fetch",
                "company vanished after insert",
            ))
        })
        .await
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = format_timestamp(&Utc::now());

        self.with_conn("insert_review", move |conn| {
            conn.execute(
                "INSERT INTO reviews (id, company_id, author_user_id, author_email, rating,
                                      issue_type, review_text, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    review.company_id.as_str(),
                    review.author_id.as_str(),
                    review.author_email,
                    i64::from(review.rating.get()),
                    review.issue.as_str(),
                    review.body,
                    review.status.as_str(),
                    created_at
                ],
            )
            .map_err(|e| StoreError::storage("insert_review", e.to_string()))?;

            Ok(Review {
                id: ReviewId(id),
                company_id: review.company_id,
                author_id: review.author_id,
                author_email: review.author_email,
                rating: review.rating,
                issue: review.issue,
                body: review.body,
                status: review.status,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .await
    }

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        let id = id.0.clone();
        self.with_conn("get_review", move |conn| fetch_review(conn, &id))
            .await
    }

    async fn list_reviews(
        &self,
        query: &ReviewQuery,
    ) -> Result<Vec<ReviewWithCompany>, StoreError> {
        let status = match query.status {
            StatusFilter::Only(status) => Some(status.as_str()),
            StatusFilter::All => None,
        };
        let company_id = query.company_id.as_ref().map(|id| id.0.clone());
        let limit = limit_to_i64(query.limit, "list_reviews")?;

        self.with_conn("list_reviews", move |conn| {
            let sql = format!(
                "SELECT {}, c.id, c.name, c.vat_uid, c.country, c.created_at
                 FROM reviews r
                 JOIN companies c ON c.id = r.company_id
                 WHERE (?1 IS NULL OR r.status = ?1)
                   AND (?2 IS NULL OR r.company_id = ?2)
                 ORDER BY r.created_at DESC, r.rowid DESC
                 LIMIT ?3",
                REVIEW_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| StoreError::storage("list_reviews", e.to_string()))?;
            let rows = stmt
                .query_map(params![status, company_id, limit], |row| {
                    Ok((ReviewRow::read(row)?, CompanyRow::read(row, 9)?))
                })
                .map_err(|e| StoreError::storage("list_reviews", e.to_string()))?;

            let mut results = Vec::new();
            for row in rows {
                let (review_row, company_row) =
                    row.map_err(|e| StoreError::storage("list_reviews", e.to_string()))?;
                let review_id = review_row.id.clone();

                // Skip undecodable rows so one bad row does not hide the queue.
                let decoded = review_row
                    .decode()
                    .and_then(|review| company_row.decode().map(|company| (review, company)));
                match decoded {
                    Ok((review, company)) => results.push(ReviewWithCompany {
                        review,
                        company_name: company.name,
                        company_vat: company.vat,
                        company_country: company.country,
                    }),
                    Err(e) => warn!("Skipping review {}: {}", review_id, e),
                }
            }
            Ok(results)
        })
        .await
    }

    async fn update_review_status(
        &self,
        id: &ReviewId,
        status: ReviewStatus,
    ) -> Result<(), StoreError> {
        let id = id.0.clone();
        self.with_conn("update_review_status", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE reviews SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )
                .map_err(|e| StoreError::storage("update_review_status", e.to_string()))?;
            if changed == 0 {
                return Err(StoreError::not_found("review"));
            }
            Ok(())
        })
        .await
    }

    async fn update_review_content(
        &self,
        id: &ReviewId,
        edit: &ReviewEdit,
    ) -> Result<(), StoreError> {
        let id = id.0.clone();
        let edit = edit.clone();
        self.with_conn("update_review_content", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE reviews SET issue_type = ?1, rating = ?2, review_text = ?3
                     WHERE id = ?4",
                    params![
                        edit.issue.as_str(),
                        i64::from(edit.rating.get()),
                        edit.body,
                        id
                    ],
                )
                .map_err(|e| StoreError::storage("update_review_content", e.to_string()))?;
            if changed == 0 {
                return Err(StoreError::not_found("review"));
            }
            Ok(())
        })
        .await
    }

    async fn delete_review(&self, id: &ReviewId) -> Result<Option<Review>, StoreError> {
        let id = id.0.clone();
        self.with_conn("delete_review", move |conn| {
            // DELETE...RETURNING removes and reads the row atomically
            let sql = format!(
                "DELETE FROM reviews WHERE id = ?1 RETURNING {}",
                RETURNED_REVIEW_COLUMNS
            );
            conn.query_row(&sql, params![id], ReviewRow::read)
                .optional()
                .map_err(|e| StoreError::storage("delete_review", e.to_string()))?
                .map(ReviewRow::decode)
                .transpose()
        })
        .await
    }

    async fn is_admin(&self, user: &UserId) -> Result<bool, StoreError> {
        let user = user.0.clone();
        self.with_conn("is_admin", move |conn| {
            let flag: Option<bool> = conn
                .query_row(
                    "SELECT is_admin FROM profiles WHERE user_id = ?1",
                    params![user],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::storage("is_admin", e.to_string()))?;
            Ok(flag.unwrap_or(false))
        })
        .await
    }

    async fn set_admin(&self, user: &UserId, is_admin: bool) -> Result<(), StoreError> {
        let user = user.0.clone();
        self.with_conn("set_admin", move |conn| {
            conn.execute(
                "INSERT INTO profiles (user_id, is_admin) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET is_admin = excluded.is_admin",
                params![user, is_admin],
            )
            .map_err(|e| StoreError::storage("set_admin", e.to_string()))?;
            Ok(())
        })
        .await
    }
}
