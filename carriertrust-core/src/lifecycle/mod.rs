//! Explicit state machine for the review moderation lifecycle.
//!
//! The design separates:
//! - **State**: where a review is in its lifecycle (`LifecycleState`)
//! - **Events**: what the submitter or administrator asked for (`Event`)
//! - **Effects**: what must happen to the store and the notifier (`Effect`)
//! - **Transition**: pure function `(State, Event) -> Result<(State, Vec<Effect>)>`
//!
//! The server's lifecycle manager interprets the effects in order against the
//! record store and the notifier.

pub mod effect;
pub mod event;
pub mod state;
pub mod transition;

pub use effect::*;
pub use event::*;
pub use state::*;
pub use transition::*;
