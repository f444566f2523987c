//! Lifecycle states of a single review.

use serde::Serialize;
use std::fmt;

use crate::model::ReviewStatus;

/// Where a review is in its lifecycle.
///
/// `Absent` is the state before submission and `Deleted` the end state after
/// removal; neither is ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Pending,
    Published,
    Hidden,
    Deleted,
}

impl LifecycleState {
    /// The stored status for this state, if it is a stored state at all.
    pub fn status(&self) -> Option<ReviewStatus> {
        match self {
            Self::Pending => Some(ReviewStatus::Pending),
            Self::Published => Some(ReviewStatus::Published),
            Self::Hidden => Some(ReviewStatus::Hidden),
            Self::Absent | Self::Deleted => None,
        }
    }
}

impl From<ReviewStatus> for LifecycleState {
    fn from(status: ReviewStatus) -> Self {
        match status {
            ReviewStatus::Pending => Self::Pending,
            ReviewStatus::Published => Self::Published,
            ReviewStatus::Hidden => Self::Hidden,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Hidden => "hidden",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}
