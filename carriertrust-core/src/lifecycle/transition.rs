//! Pure state transition function.
//!
//! Given the current state and an event, returns the new state and the
//! effects to execute. This function has no side effects.
//!
//! | From              | Event           | To        | Effects                                   |
//! |-------------------|-----------------|-----------|-------------------------------------------|
//! | Absent            | Submitted       | Pending   | Notify admin (detached)                   |
//! | Pending           | Approved        | Published | SetStatus, Notify author (reported)       |
//! | Published         | Approved        | Published | Notify author again (reported)            |
//! | Pending/Published | Edited          | unchanged | OverwriteContent                          |
//! | Pending/Published | DeleteRequested | Deleted   | Notify author (reported), then Remove     |
//! | Hidden            | DeleteRequested | Deleted   | Notify author (reported), then Remove     |
//!
//! Everything else is an [`InvalidTransition`].

use super::effect::{Delivery, Effect, NotificationKind};
use super::event::Event;
use super::state::LifecycleState;
use crate::model::ReviewStatus;

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// The new state after the transition.
    pub state: LifecycleState,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LifecycleState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

/// An event that has no meaning in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} to a {state} review")]
pub struct InvalidTransition {
    pub state: LifecycleState,
    pub event: &'static str,
}

/// Pure state transition function.
pub fn transition(
    state: LifecycleState,
    event: Event,
) -> Result<TransitionResult, InvalidTransition> {
    use LifecycleState::*;

    match (state, event) {
        (Absent, Event::Submitted) => Ok(TransitionResult::new(
            Pending,
            vec![Effect::Notify {
                notification: NotificationKind::ReviewSubmitted,
                delivery: Delivery::Detached,
            }],
        )),

        (Pending, Event::Approved) => Ok(TransitionResult::new(
            Published,
            vec![
                Effect::SetStatus {
                    status: ReviewStatus::Published,
                },
                notify_published(),
            ],
        )),

        // Re-approving leaves the row alone but resends the email.
        (Published, Event::Approved) => {
            Ok(TransitionResult::new(Published, vec![notify_published()]))
        }

        (current @ (Pending | Published), Event::Edited(edit)) => Ok(TransitionResult::new(
            current,
            vec![Effect::OverwriteContent { edit }],
        )),

        // The notifier reads the row, so it must run before the row is removed.
        // Removal is the only event a hidden row accepts.
        (Pending | Published | Hidden, Event::DeleteRequested) => Ok(TransitionResult::new(
            Deleted,
            vec![
                Effect::Notify {
                    notification: NotificationKind::ReviewDeleted,
                    delivery: Delivery::Reported,
                },
                Effect::Remove,
            ],
        )),

        (state, event) => Err(InvalidTransition {
            state,
            event: event.log_summary(),
        }),
    }
}

fn notify_published() -> Effect {
    Effect::Notify {
        notification: NotificationKind::StatusChanged {
            new_status: ReviewStatus::Published,
        },
        delivery: Delivery::Reported,
    }
}
