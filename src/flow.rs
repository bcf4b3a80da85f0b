//! Interaction flow state machine
//!
//! Elm-style: a pure [`transition`] function maps `(state, event)` to a new
//! state plus the effects the runtime must carry out before committing it.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{FlowEffect, FlowNotification};
pub use event::{FlowEvent, TurnId};
pub use state::FlowState;
pub use transition::{transition, FlowError, TransitionResult};
