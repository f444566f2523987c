//! Validation of review submissions before anything touches the store.

use serde::{Deserialize, Deserializer};

use crate::model::{IssueCategory, Rating};
use crate::vat::VatId;

/// The single user-facing message for any missing or invalid field.
pub const REQUIRED_FIELDS_MESSAGE: &str =
    "Please fill all required fields and select a star rating.";

/// Raw submission as entered by the user.
///
/// Every field deserializes leniently: a missing field, an explicit `null`,
/// or a value of the wrong shape all become empty, so that malformed input
/// is rejected by [`ReviewDraft::validate`] with the single message rather
/// than by the decoder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewDraft {
    #[serde(default, deserialize_with = "lenient_text")]
    pub company_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub vat: String,
    #[serde(default, deserialize_with = "lenient")]
    pub issue: Option<IssueCategory>,
    /// Absent until the user picks a star.
    #[serde(default, deserialize_with = "lenient")]
    pub rating: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Other(serde::de::IgnoredAny),
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Value(value) => Some(value),
        Lenient::Other(_) => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, String>(deserializer)?.unwrap_or_default())
}

/// A submission whose every required field is present and in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub company_name: String,
    pub vat: VatId,
    /// Derived from the VAT prefix, never supplied by the user.
    pub country: String,
    pub issue: IssueCategory,
    pub rating: Rating,
    pub body: String,
}

/// Validation failure. Any missing field rejects the whole submission with
/// no field-level detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", REQUIRED_FIELDS_MESSAGE)]
pub struct SubmissionError;

impl ReviewDraft {
    pub fn validate(&self) -> Result<ValidSubmission, SubmissionError> {
        let company_name = self.company_name.trim();
        let vat = VatId::normalize(&self.vat);
        let country = vat.country().unwrap_or_default();
        let body = self.body.trim();

        if company_name.is_empty() || vat.is_empty() || country.is_empty() || body.is_empty() {
            return Err(SubmissionError);
        }
        let issue = self.issue.ok_or(SubmissionError)?;
        let rating = self.rating.and_then(Rating::new).ok_or(SubmissionError)?;

        Ok(ValidSubmission {
            company_name: company_name.to_string(),
            vat,
            country: country.to_string(),
            issue,
            rating,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ReviewDraft {
        ReviewDraft {
            company_name: " Acme Freight ".to_string(),
            vat: "lv40003000000".to_string(),
            issue: Some(IssueCategory::LatePayment),
            rating: Some(2),
            body: "Invoice paid 90 days late.".to_string(),
        }
    }

    #[test]
    fn test_complete_draft_is_accepted() {
        let valid = complete().validate().unwrap();
        assert_eq!(valid.company_name, "Acme Freight");
        assert_eq!(valid.vat.as_str(), "LV40003000000");
        assert_eq!(valid.country, "Latvia");
        assert_eq!(valid.rating.get(), 2);
    }

    #[test]
    fn test_each_missing_field_rejects() {
        let mut d = complete();
        d.company_name = "   ".to_string();
        assert_eq!(d.validate(), Err(SubmissionError));

        let mut d = complete();
        d.vat = String::new();
        assert_eq!(d.validate(), Err(SubmissionError));

        let mut d = complete();
        d.rating = None;
        assert_eq!(d.validate(), Err(SubmissionError));

        let mut d = complete();
        d.body = "\n".to_string();
        assert_eq!(d.validate(), Err(SubmissionError));

        let mut d = complete();
        d.issue = None;
        assert_eq!(d.validate(), Err(SubmissionError));
    }

    #[test]
    fn test_unknown_vat_prefix_means_no_country() {
        let mut d = complete();
        d.vat = "ZZ123".to_string();
        assert_eq!(d.validate(), Err(SubmissionError));
    }

    #[test]
    fn test_rating_out_of_range_rejects() {
        for bad in [0, 6, -3] {
            let mut d = complete();
            d.rating = Some(bad);
            assert_eq!(d.validate(), Err(SubmissionError));
        }
        for good in 1..=5 {
            let mut d = complete();
            d.rating = Some(good);
            assert!(d.validate().is_ok());
        }
    }

    #[test]
    fn test_error_message_is_the_single_user_message() {
        assert_eq!(SubmissionError.to_string(), REQUIRED_FIELDS_MESSAGE);
    }

    #[test]
    fn test_null_and_mistyped_fields_fall_through_to_validation() {
        let cases = [
            r#"{"company_name":null,"vat":"LV1","issue":"late_payment","rating":2,"body":"x"}"#,
            r#"{"company_name":"X","vat":"LV1","issue":"","rating":2,"body":"x"}"#,
            r#"{"company_name":"X","vat":"LV1","issue":"late_payment","rating":2,"body":null}"#,
            r#"{"company_name":"X","vat":"LV1","issue":"late_payment","rating":"5","body":"x"}"#,
            r#"{"company_name":7,"vat":["LV1"],"issue":null,"rating":null,"body":{}}"#,
        ];
        for case in cases {
            let draft: ReviewDraft = serde_json::from_str(case).unwrap();
            assert_eq!(draft.validate(), Err(SubmissionError), "{}", case);
        }

        let draft: ReviewDraft = serde_json::from_str(
            r#"{"company_name":"X","vat":"LV1","issue":"late_payment","rating":2,"body":"x"}"#,
        )
        .unwrap();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_deserializes_with_missing_fields() {
        let draft: ReviewDraft = serde_json::from_str(r#"{"company_name":"X"}"#).unwrap();
        assert_eq!(draft.validate(), Err(SubmissionError));
    }
}
