//! Request/response shapes for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chat_core::{ChatMessage, ChatTopic};

/// Body of `POST /api/chat`, one turn per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// Wire form is a string so a malformed id yields a validation error,
    /// not a deserialization failure.
    pub topic_id: String,
    pub assistant_id: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub content: String,
}

/// Metadata attached to streamed chunks so the client can place the
/// in-flight exchange in its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub topic_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/topics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub assistant_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// `GET /api/topics/{id}` response: the topic plus its full message set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicResponse {
    pub topic: TopicWithMessages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicWithMessages {
    #[serde(flatten)]
    pub topic: ChatTopic,
    pub messages: Vec<ChatMessage>,
}

/// Read-only assistant listing (settings CRUD lives elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSummary {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub configured: bool,
}
