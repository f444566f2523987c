//! Events that drive the review lifecycle.

use crate::model::ReviewEdit;

/// Something a user asked to happen to a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An authenticated user's submission was stored.
    Submitted,
    /// The administrator approved the review for publication.
    Approved,
    /// The administrator overwrote the review's content fields.
    Edited(ReviewEdit),
    /// The administrator asked for the review to be removed.
    DeleteRequested,
}

impl Event {
    /// Short name for log lines.
    pub fn log_summary(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Edited(_) => "Edited",
            Self::DeleteRequested => "DeleteRequested",
        }
    }
}
