//! Conversation states - the request lifecycle of one open conversation.

use serde::{Deserialize, Serialize};

/// Lifecycle of the in-flight request for a conversation.
///
/// Error and stopped conditions are not states of their own; they are
/// transient annotations the store keeps alongside `Idle`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// No request in flight, awaiting user input.
    #[default]
    Idle,

    /// Request sent, no content chunk received yet.
    Submitted,

    /// Content chunks are arriving.
    Streaming,
}

impl ChatStatus {
    /// Whether a turn is currently in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }

    /// Whether the conversation accepts new user input.
    pub fn accepts_input(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_idle() {
        assert_eq!(ChatStatus::default(), ChatStatus::Idle);
    }

    #[test]
    fn busy_detection() {
        assert!(ChatStatus::Submitted.is_busy());
        assert!(ChatStatus::Streaming.is_busy());
        assert!(!ChatStatus::Idle.is_busy());
        assert!(ChatStatus::Idle.accepts_input());
    }
}
