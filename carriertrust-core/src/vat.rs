//! VAT identifier normalization and country resolution.
//!
//! A VAT identifier is the natural deduplication key for companies. It is
//! stored in normalized form (trimmed, upper-case) and its two-letter prefix
//! determines the company's country at creation time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-letter VAT prefixes this directory recognizes.
///
/// EU member states use their VAT prefix (note `EL` for Greece); the last three
/// entries are common non-EU formats seen on freight invoices.
const VAT_COUNTRIES: [(&str, &str); 30] = [
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("CY", "Cyprus"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EE", "Estonia"),
    ("EL", "Greece"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("HR", "Croatia"),
    ("HU", "Hungary"),
    ("IE", "Ireland"),
    ("IT", "Italy"),
    ("LT", "Lithuania"),
    ("LU", "Luxembourg"),
    ("LV", "Latvia"),
    ("MT", "Malta"),
    ("NL", "Netherlands"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("SE", "Sweden"),
    ("SI", "Slovenia"),
    ("SK", "Slovakia"),
    ("GB", "United Kingdom"),
    ("CH", "Switzerland"),
    ("NO", "Norway"),
];

/// Newtype for a normalized VAT identifier.
///
/// Construct through [`VatId::normalize`] (or `From<&str>`) so the inner value
/// is always trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VatId(String);

impl VatId {
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Country for this identifier's prefix, if the prefix is known.
    pub fn country(&self) -> Option<&'static str> {
        let prefix = self.0.get(..2)?;
        VAT_COUNTRIES
            .iter()
            .find(|(code, _)| *code == prefix)
            .map(|(_, country)| *country)
    }
}

impl fmt::Display for VatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VatId {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

impl From<String> for VatId {
    fn from(raw: String) -> Self {
        Self::normalize(&raw)
    }
}

/// Trim and upper-case a raw VAT string.
pub fn normalize_vat(raw: &str) -> VatId {
    VatId::normalize(raw)
}

/// Resolve the country for a raw VAT string.
///
/// Total and side-effect free: unknown or too-short input yields `None`.
pub fn country_from_vat(raw: &str) -> Option<&'static str> {
    VatId::normalize(raw).country()
}
