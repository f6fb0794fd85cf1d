use crate::error::Result;
use async_trait::async_trait;
use chat_core::{ChatMessage, ChatTopic, MessageMetadata, Role};
use uuid::Uuid;

/// Parameters for persisting one message node.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub topic_id: Uuid,
    pub content: String,
    pub role: Role,
    pub parent_id: Option<Uuid>,
    pub metadata: Option<MessageMetadata>,
}

/// Durable storage for topics and their message trees.
///
/// Per-call atomicity only; no multi-step transactional guarantee. Messages
/// are append-only: there is no update or delete, edits create siblings.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_topic(&self, assistant_id: &str, title: Option<String>) -> Result<ChatTopic>;
    async fn find_topic(&self, id: Uuid) -> Result<Option<ChatTopic>>;
    async fn list_topics(&self, assistant_id: Option<&str>) -> Result<Vec<ChatTopic>>;

    /// Persist a message. Fails if the topic does not exist or the parent is
    /// not an existing message of the same topic (this is what makes the
    /// forest acyclic by construction).
    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage>;
    async fn find_message(&self, id: Uuid) -> Result<Option<ChatMessage>>;
    async fn find_messages_by_topic(&self, topic_id: Uuid) -> Result<Vec<ChatMessage>>;
}
