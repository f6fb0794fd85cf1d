//! Transition logic for the conversation request lifecycle.

use super::events::ConversationEvent;
use super::states::ChatStatus;

/// Result of handling one event.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: ChatStatus,
    pub to: ChatStatus,
    pub event: ConversationEvent,
    /// Whether the status actually changed.
    pub changed: bool,
}

/// Tiny FSM over `ChatStatus`. Termination events (finish, abort, error) all
/// resolve back to `Idle`; the store layers notices on top of that.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: ChatStatus,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ChatStatus {
        self.current
    }

    /// Handle an event and transition.
    pub fn handle_event(&mut self, event: ConversationEvent) -> StateTransition {
        let from = self.current;
        let to = Self::next_status(from, &event);
        self.current = to;

        let transition = StateTransition {
            from,
            to,
            event,
            changed: from != to,
        };

        if transition.changed {
            tracing::debug!(from = ?transition.from, to = ?transition.to, event = %transition.event, "conversation status changed");
        }

        transition
    }

    fn next_status(status: ChatStatus, event: &ConversationEvent) -> ChatStatus {
        use ChatStatus::*;
        use ConversationEvent::*;

        match (status, event) {
            (Idle, RequestSubmitted) => Submitted,
            (Submitted, FirstChunkReceived) => Streaming,
            (Submitted | Streaming, StreamFinished | StreamAborted | StreamErrored) => Idle,
            // First-chunk while already streaming, or stray terminal events
            // while idle, change nothing.
            _ => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_turn_lifecycle() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.status(), ChatStatus::Idle);

        let t = sm.handle_event(ConversationEvent::RequestSubmitted);
        assert!(t.changed);
        assert_eq!(sm.status(), ChatStatus::Submitted);

        let t = sm.handle_event(ConversationEvent::FirstChunkReceived);
        assert!(t.changed);
        assert_eq!(sm.status(), ChatStatus::Streaming);

        let t = sm.handle_event(ConversationEvent::StreamFinished);
        assert!(t.changed);
        assert_eq!(sm.status(), ChatStatus::Idle);
    }

    #[test]
    fn abort_from_submitted_returns_to_idle() {
        let mut sm = StateMachine::new();
        sm.handle_event(ConversationEvent::RequestSubmitted);
        let t = sm.handle_event(ConversationEvent::StreamAborted);
        assert!(t.changed);
        assert_eq!(sm.status(), ChatStatus::Idle);
    }

    #[test]
    fn stray_events_do_not_move_idle() {
        let mut sm = StateMachine::new();
        let t = sm.handle_event(ConversationEvent::StreamFinished);
        assert!(!t.changed);
        assert_eq!(sm.status(), ChatStatus::Idle);
    }
}
