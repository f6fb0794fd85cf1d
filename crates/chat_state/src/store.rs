//! Conversation store - explicit client state with a unidirectional reducer.
//!
//! The store owns everything the chat view needs: the display message set,
//! the active branch path, the input draft, the request lifecycle, and the
//! stall tracking for a hung stream. All updates go through [`ConversationStore::apply`],
//! which returns the side effects the caller must execute (send a request,
//! cancel the in-flight stream, refetch the topic). The store itself never
//! performs I/O, and all time is passed in, so stall behavior is testable
//! with a simulated clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chat_core::{build_chain, get_default_leaf, ChatMessage, Role};

use crate::machine::{ChatStatus, ConversationEvent, StateMachine};

/// Default threshold for declaring a stream stalled.
pub const STALL_TIMEOUT_SECS: i64 = 30;

/// Why the client cancelled the stream. The server never sees the
/// distinction; both arrive as the same transport abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Manual,
    Timeout,
}

/// Inputs to the reducer.
#[derive(Debug, Clone)]
pub enum StoreAction {
    /// User sends a new message continuing the active path.
    SubmitMessage {
        content: String,
        now: DateTime<Utc>,
    },
    /// User edits an existing user message: submits a sibling branch.
    EditMessage {
        message_id: Uuid,
        content: String,
        now: DateTime<Utc>,
    },
    /// A fresh server snapshot of the topic's messages arrived.
    ServerMessagesFetched { messages: Vec<ChatMessage> },
    /// A content chunk for the in-flight assistant reply arrived.
    AssistantDelta {
        text: String,
        now: DateTime<Utc>,
    },
    /// The stream terminated naturally.
    StreamFinished,
    /// The transport or model capability failed.
    StreamErrored { message: String },
    /// The transport abort completed after a stop.
    StreamAborted,
    /// User (or the stall timer) stops generation.
    Stop {
        reason: StopReason,
        now: DateTime<Utc>,
    },
    /// Periodic stall check, expected roughly every second while busy.
    Tick { now: DateTime<Utc> },
    /// User switches the visible branch to the chain ending at `leaf_id`.
    SelectLeaf { leaf_id: Uuid },
    /// User typed in the composer.
    UpdateDraft { content: String },
}

/// Side effects for the caller to run after a reducer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Put a turn request on the wire.
    SendRequest {
        topic_id: Uuid,
        assistant_id: String,
        parent_id: Option<Uuid>,
        content: String,
    },
    /// Cancel the in-flight network stream.
    CancelStream,
    /// Refetch the topic so server-persisted state becomes the display
    /// source of truth.
    RefetchTopic,
}

/// Serializable client state for one open conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStore {
    topic_id: Uuid,
    assistant_id: String,
    #[serde(skip)]
    machine: StateMachine,
    /// Display view: the last server snapshot plus any in-flight exchange.
    messages: Vec<ChatMessage>,
    current_branch_path: Vec<Uuid>,
    input_draft: String,
    /// Content of the last sent message, kept until the turn settles so a
    /// transport error can restore it into the draft.
    last_sent_content: Option<String>,
    /// Optimistically-added user message of the in-flight turn.
    pending_user_message_id: Option<Uuid>,
    /// Locally-accumulating assistant message of the in-flight turn.
    streaming_message_id: Option<Uuid>,
    /// Assistant message the user stopped; kept until a refetch shows it
    /// persisted with `incomplete` metadata.
    stopped_message_id: Option<Uuid>,
    last_activity_at: Option<DateTime<Utc>>,
    /// Guard so one stall surfaces exactly one timeout notice.
    stall_fired: bool,
    timeout_notice: Option<String>,
    connection_error: Option<String>,
    stall_timeout_secs: i64,
}

impl ConversationStore {
    pub fn new(topic_id: Uuid, assistant_id: impl Into<String>) -> Self {
        Self {
            topic_id,
            assistant_id: assistant_id.into(),
            machine: StateMachine::new(),
            messages: Vec::new(),
            current_branch_path: Vec::new(),
            input_draft: String::new(),
            last_sent_content: None,
            pending_user_message_id: None,
            streaming_message_id: None,
            stopped_message_id: None,
            last_activity_at: None,
            stall_fired: false,
            timeout_notice: None,
            connection_error: None,
            stall_timeout_secs: STALL_TIMEOUT_SECS,
        }
    }

    pub fn with_stall_timeout(mut self, secs: i64) -> Self {
        self.stall_timeout_secs = secs;
        self
    }

    pub fn status(&self) -> ChatStatus {
        self.machine.status()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn current_branch_path(&self) -> &[Uuid] {
        &self.current_branch_path
    }

    pub fn input_draft(&self) -> &str {
        &self.input_draft
    }

    pub fn timeout_notice(&self) -> Option<&str> {
        self.timeout_notice.as_deref()
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    pub fn stopped_message_id(&self) -> Option<Uuid> {
        self.stopped_message_id
    }

    /// The leaf the view currently follows.
    pub fn current_leaf_id(&self) -> Option<Uuid> {
        self.current_branch_path
            .last()
            .copied()
            .or_else(|| get_default_leaf(&self.messages).map(|m| m.id))
    }

    /// Apply one action, returning the effects the caller must run.
    pub fn apply(&mut self, action: StoreAction) -> Vec<Effect> {
        match action {
            StoreAction::SubmitMessage { content, now } => {
                let parent_id = self.current_leaf_id();
                self.submit(content, parent_id, now)
            }
            StoreAction::EditMessage {
                message_id,
                content,
                now,
            } => {
                // Branch instead of mutate: the new message shares the
                // edited message's parent.
                let Some(parent_id) = self
                    .messages
                    .iter()
                    .find(|m| m.id == message_id)
                    .map(|m| m.parent_id)
                else {
                    tracing::warn!(topic_id = %self.topic_id, %message_id, "edit target not in view, ignoring");
                    return Vec::new();
                };
                self.submit(content, parent_id, now)
            }
            StoreAction::ServerMessagesFetched { messages } => {
                self.sync_server_messages(messages);
                Vec::new()
            }
            StoreAction::AssistantDelta { text, now } => {
                self.on_assistant_delta(text, now);
                Vec::new()
            }
            StoreAction::StreamFinished => {
                self.machine.handle_event(ConversationEvent::StreamFinished);
                self.last_sent_content = None;
                self.connection_error = None;
                self.timeout_notice = None;
                self.clear_inflight();
                vec![Effect::RefetchTopic]
            }
            StoreAction::StreamErrored { message } => self.on_stream_error(message),
            StoreAction::StreamAborted => {
                self.machine.handle_event(ConversationEvent::StreamAborted);
                self.clear_inflight();
                vec![Effect::RefetchTopic]
            }
            StoreAction::Stop { reason, now } => self.stop(reason, now),
            StoreAction::Tick { now } => self.tick(now),
            StoreAction::SelectLeaf { leaf_id } => {
                self.current_branch_path = build_chain(&self.messages, leaf_id)
                    .iter()
                    .map(|m| m.id)
                    .collect();
                Vec::new()
            }
            StoreAction::UpdateDraft { content } => {
                self.input_draft = content;
                Vec::new()
            }
        }
    }

    fn submit(
        &mut self,
        content: String,
        parent_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        if self.status().is_busy() {
            tracing::warn!(topic_id = %self.topic_id, "submit ignored while a turn is in flight");
            return Vec::new();
        }

        let mut user_message = ChatMessage::new(self.topic_id, content.clone(), Role::User, parent_id);
        user_message.created_at = now;
        let user_message_id = user_message.id;

        self.messages.push(user_message);
        self.pending_user_message_id = Some(user_message_id);
        self.last_sent_content = Some(content.clone());
        self.input_draft.clear();
        self.connection_error = None;
        self.timeout_notice = None;
        self.last_activity_at = Some(now);
        self.stall_fired = false;

        self.machine
            .handle_event(ConversationEvent::RequestSubmitted);

        // The user watches their own turn regardless of the default leaf.
        self.force_path_to(user_message_id);

        vec![Effect::SendRequest {
            topic_id: self.topic_id,
            assistant_id: self.assistant_id.clone(),
            parent_id,
            content,
        }]
    }

    fn sync_server_messages(&mut self, messages: Vec<ChatMessage>) {
        // While a turn is in flight the local view owns the display; the
        // refetch on settle reconciles.
        if self.status().is_busy() {
            return;
        }

        // A stopped reply is confirmed once the server shows an assistant
        // message persisted with the incomplete flag; server-assigned ids
        // replace the local in-flight id at that point.
        if self.stopped_message_id.is_some() {
            let persisted = messages
                .iter()
                .any(|m| m.role == Role::Assistant && m.is_incomplete());
            if persisted {
                self.stopped_message_id = None;
            }
        }

        self.messages = messages;

        if self.messages.is_empty() {
            self.current_branch_path.clear();
            return;
        }

        let leaf_still_exists = self
            .current_branch_path
            .last()
            .map(|leaf| self.messages.iter().any(|m| m.id == *leaf))
            .unwrap_or(false);

        if !leaf_still_exists {
            self.current_branch_path = get_default_leaf(&self.messages)
                .map(|leaf| {
                    build_chain(&self.messages, leaf.id)
                        .iter()
                        .map(|m| m.id)
                        .collect()
                })
                .unwrap_or_default();
        }
    }

    fn on_assistant_delta(&mut self, text: String, now: DateTime<Utc>) {
        if !self.status().is_busy() {
            tracing::debug!(topic_id = %self.topic_id, "delta after settle, dropped");
            return;
        }

        self.machine
            .handle_event(ConversationEvent::FirstChunkReceived);

        match self.streaming_message_id {
            Some(id) => {
                if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
                    message.content.push_str(&text);
                }
            }
            None => {
                let mut assistant = ChatMessage::new(
                    self.topic_id,
                    text,
                    Role::Assistant,
                    self.pending_user_message_id,
                );
                assistant.created_at = now;
                self.streaming_message_id = Some(assistant.id);
                let id = assistant.id;
                self.messages.push(assistant);
                self.force_path_to(id);
            }
        }

        // Any growth of the assistant text counts as activity.
        self.last_activity_at = Some(now);
        self.stall_fired = false;
    }

    fn on_stream_error(&mut self, message: String) -> Vec<Effect> {
        self.machine.handle_event(ConversationEvent::StreamErrored);
        self.connection_error = Some(message);

        // The user message was persisted server-side before the stream
        // started, so the refetch will show it; the local copy is removed
        // only to avoid rendering it from two sources.
        if let Some(pending_id) = self.pending_user_message_id {
            self.messages.retain(|m| m.id != pending_id);
            self.current_branch_path.retain(|id| *id != pending_id);
        }
        if let Some(streaming_id) = self.streaming_message_id {
            self.messages.retain(|m| m.id != streaming_id);
            self.current_branch_path.retain(|id| *id != streaming_id);
        }

        // Do not lose the user's words.
        if let Some(content) = self.last_sent_content.take() {
            self.input_draft = content;
        }

        self.clear_inflight();
        vec![Effect::RefetchTopic]
    }

    fn stop(&mut self, reason: StopReason, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.status().is_busy() {
            return Vec::new();
        }

        if let Some(streaming_id) = self.streaming_message_id {
            self.stopped_message_id = Some(streaming_id);
        }
        if reason == StopReason::Timeout {
            self.timeout_notice = Some("Response timed out; generation stopped.".to_string());
        }
        self.last_activity_at = Some(now);

        tracing::info!(topic_id = %self.topic_id, ?reason, "stopping in-flight stream");
        vec![Effect::CancelStream]
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.status().is_busy() || self.stall_fired {
            return Vec::new();
        }
        let Some(last_activity) = self.last_activity_at else {
            return Vec::new();
        };

        if now - last_activity > Duration::seconds(self.stall_timeout_secs) {
            self.stall_fired = true;
            return self.stop(StopReason::Timeout, now);
        }

        Vec::new()
    }

    fn force_path_to(&mut self, leaf_id: Uuid) {
        self.current_branch_path = build_chain(&self.messages, leaf_id)
            .iter()
            .map(|m| m.id)
            .collect();
    }

    fn clear_inflight(&mut self) {
        self.pending_user_message_id = None;
        self.streaming_message_id = None;
        self.last_activity_at = None;
        self.stall_fired = false;
    }
}
