//! Effects (side effects as data).
//!
//! Effects describe what must happen as a result of a transition. The order
//! of the returned list is significant and the interpreter preserves it.

use serde::Serialize;

use crate::model::{ReviewEdit, ReviewStatus};

/// Email notifications the external notifier can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Tell the administrator a new review awaits moderation.
    ReviewSubmitted,
    /// Tell the author their review's status changed.
    StatusChanged { new_status: ReviewStatus },
    /// Tell the author their review was removed. The notifier reads the
    /// review, so this must run while the row still exists.
    ReviewDeleted,
}

/// How the interpreter treats a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Spawned; its failure is logged and never reaches the caller.
    Detached,
    /// Awaited; its failure becomes a warning on an otherwise successful result.
    Reported,
}

/// All effects that transitions can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Persist a new status for the review.
    SetStatus { status: ReviewStatus },
    /// Overwrite issue category, rating and body.
    OverwriteContent { edit: ReviewEdit },
    /// Ask the notifier to send an email about the review.
    Notify {
        notification: NotificationKind,
        delivery: Delivery,
    },
    /// Remove the review row.
    Remove,
}

impl Effect {
    /// Returns true for effects that change the record store.
    pub fn mutates_store(&self) -> bool {
        matches!(
            self,
            Effect::SetStatus { .. } | Effect::OverwriteContent { .. } | Effect::Remove
        )
    }
}
