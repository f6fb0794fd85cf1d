//! chat_state - Client-side conversation state for the chat workbench
//!
//! This crate provides the per-conversation state machine (idle, submitted,
//! streaming) and the conversation store: an explicit, serializable state
//! object updated through a single reducer. Side effects (cancelling a
//! stream, refetching a topic, surfacing a notice) are returned as values
//! and executed by the caller at the boundary.

pub mod machine;
pub mod store;

// Re-export commonly used types
pub use machine::{ChatStatus, ConversationEvent, StateMachine, StateTransition};
pub use store::{ConversationStore, Effect, StopReason, StoreAction};
