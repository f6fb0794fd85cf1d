//! State machine module
//!
//! Contains the FSM for the per-conversation request lifecycle.

mod events;
mod states;
mod transitions;

pub use events::ConversationEvent;
pub use states::ChatStatus;
pub use transitions::{StateMachine, StateTransition};
