//! Record types shared by the store, the services and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::vat::VatId;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Opaque company identifier assigned by the record store.
    CompanyId
);
string_id!(
    /// Opaque review identifier assigned by the record store.
    ReviewId
);
string_id!(
    /// Opaque user identifier issued by the identity provider.
    UserId
);

/// Error returned when parsing one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of problem a review reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    NonPayment,
    LatePayment,
    Dispute,
    Fraud,
    Other,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        Self::NonPayment,
        Self::LatePayment,
        Self::Dispute,
        Self::Fraud,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonPayment => "non_payment",
            Self::LatePayment => "late_payment",
            Self::Dispute => "dispute",
            Self::Fraud => "fraud",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "issue category",
                value: s.to_string(),
            })
    }
}

/// Stored status of a review.
///
/// Deletion is not a status: a deleted review no longer exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Published,
    /// Part of the stored domain; no moderation action produces it.
    Hidden,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Hidden => "hidden",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Published)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "hidden" => Ok(Self::Hidden),
            other => Err(ParseEnumError {
                kind: "review status",
                value: other.to_string(),
            }),
        }
    }
}

/// Star rating in the closed range 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or_else(|| format!("rating must be between 1 and 5, got {}", value))
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self {
        r.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A company in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub vat: VatId,
    /// Derived from the VAT prefix when the company was created; may be empty
    /// for rows created before the prefix table covered the country.
    pub country: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a company that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
    pub vat: VatId,
    pub country: String,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub company_id: CompanyId,
    pub author_id: UserId,
    /// Captured at submission so notifications can reach the author.
    pub author_email: Option<String>,
    pub rating: Rating,
    pub issue: IssueCategory,
    pub body: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for a review that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub company_id: CompanyId,
    pub author_id: UserId,
    pub author_email: Option<String>,
    pub rating: Rating,
    pub issue: IssueCategory,
    pub body: String,
    pub status: ReviewStatus,
}

/// Content fields an administrator may overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEdit {
    pub issue: IssueCategory,
    pub rating: Rating,
    pub body: String,
}

/// A review joined with the company it is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewWithCompany {
    #[serde(flatten)]
    pub review: Review,
    pub company_name: String,
    pub company_vat: VatId,
    pub company_country: String,
}

impl ReviewWithCompany {
    /// Case-insensitive substring match over company name, VAT and body.
    ///
    /// `term` is trimmed; an empty term matches everything.
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.company_name.to_lowercase().contains(&term)
            || self.company_vat.as_str().to_lowercase().contains(&term)
            || self.review.body.to_lowercase().contains(&term)
    }
}

/// Aggregate over a company's published reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: usize,
    /// Arithmetic mean rounded to one decimal; 0 when there are no reviews.
    pub average: f64,
}

impl RatingSummary {
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Rating>,
    {
        let (count, sum) = ratings
            .into_iter()
            .fold((0usize, 0u64), |(n, s), r| (n + 1, s + u64::from(r.get())));
        if count == 0 {
            return Self {
                count: 0,
                average: 0.0,
            };
        }
        let mean = sum as f64 / count as f64;
        Self {
            count,
            average: (mean * 10.0).round() / 10.0,
        }
    }
}
