//! Domain core for the CarrierTrust logistics review directory.
//!
//! Everything in this crate is pure: VAT handling, the record types, submission
//! validation, rating summaries and the review lifecycle state machine. Storage,
//! identity and email delivery live in `carriertrust-server`.

pub mod lifecycle;
pub mod model;
pub mod submission;
pub mod vat;

pub use model::*;
pub use submission::{ReviewDraft, SubmissionError, ValidSubmission, REQUIRED_FIELDS_MESSAGE};
pub use vat::{country_from_vat, normalize_vat, VatId};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Short version string for health and help endpoints.
pub fn get_version() -> String {
    // Deployment builds pin the hash explicitly
    if let Some(git_hash) = option_env!("CARRIERTRUST_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        short_hash(git_hash)
    } else {
        built_info::PKG_VERSION.to_string()
    }
}

fn short_hash(hash: &str) -> String {
    if hash.len() >= 8 {
        hash[..8].to_string()
    } else {
        hash.to_string()
    }
}
