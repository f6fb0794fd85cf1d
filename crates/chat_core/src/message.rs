//! Message and topic types shared across the system.
//!
//! Messages are immutable once created: editing never mutates a node, it
//! creates a sibling with the same `parent_id`. A topic's messages therefore
//! form a forest rooted at nodes with `parent_id = None`, and a node with
//! more than one child is a branch point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// Completion-state flags for a persisted message.
///
/// Deliberately a closed record: `incomplete` means the stream ended before
/// natural completion, `stopped` means a cancellation caused the truncation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stopped: bool,
}

impl MessageMetadata {
    /// Flags for a reply truncated by user- or timeout-initiated stop.
    pub fn stopped_partial() -> Self {
        Self {
            incomplete: true,
            stopped: true,
        }
    }
}

/// A node in the message tree.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatMessage {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub content: String,
    pub role: Role,
    /// `None` only for the first message of a topic.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn new(
        topic_id: Uuid,
        content: impl Into<String>,
        role: Role,
        parent_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_id,
            content: content.into(),
            role,
            parent_id,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this message was truncated by a stop or stream failure.
    pub fn is_incomplete(&self) -> bool {
        self.metadata.map(|m| m.incomplete).unwrap_or(false)
    }
}

/// Groups messages under one assistant. The topic never owns its message set
/// directly; messages reference it by `topic_id`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatTopic {
    pub id: Uuid,
    pub assistant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatTopic {
    pub fn new(assistant_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            assistant_id: assistant_id.into(),
            title,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Credentials and endpoint for a model provider.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Resolved assistant configuration.
///
/// An assistant without a `provider` exists but is unusable for chat; the
/// server reports that as a distinct "not configured" condition rather than
/// "not found".
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AssistantConfig {
    pub id: String,
    pub name: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serde_skips_false_flags() {
        let msg = ChatMessage::new(Uuid::new_v4(), "hi", Role::User, None);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("metadata").is_none());

        let stopped = msg.with_metadata(MessageMetadata::stopped_partial());
        let json = serde_json::to_value(&stopped).unwrap();
        assert_eq!(json["metadata"]["incomplete"], true);
        assert_eq!(json["metadata"]["stopped"], true);
    }

    #[test]
    fn incomplete_flag_readable_through_helper() {
        let msg = ChatMessage::new(Uuid::new_v4(), "partial", Role::Assistant, None)
            .with_metadata(MessageMetadata::stopped_partial());
        assert!(msg.is_incomplete());

        let complete = ChatMessage::new(Uuid::new_v4(), "done", Role::Assistant, None);
        assert!(!complete.is_incomplete());
    }

    #[test]
    fn role_display_matches_wire_names() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
