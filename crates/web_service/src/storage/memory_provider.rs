use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use chat_core::{ChatMessage, ChatTopic};

use crate::error::{AppError, Result};

use super::provider::{MessageStore, NewMessage};

/// In-memory store backed by concurrent maps. Default backend for tests and
/// ephemeral dev runs.
#[derive(Default)]
pub struct MemoryMessageStore {
    topics: DashMap<Uuid, ChatTopic>,
    messages: DashMap<Uuid, ChatMessage>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create_topic(&self, assistant_id: &str, title: Option<String>) -> Result<ChatTopic> {
        let topic = ChatTopic::new(assistant_id, title);
        self.topics.insert(topic.id, topic.clone());
        tracing::debug!(topic_id = %topic.id, assistant_id, "memory store: topic created");
        Ok(topic)
    }

    async fn find_topic(&self, id: Uuid) -> Result<Option<ChatTopic>> {
        Ok(self.topics.get(&id).map(|t| t.clone()))
    }

    async fn list_topics(&self, assistant_id: Option<&str>) -> Result<Vec<ChatTopic>> {
        let mut topics: Vec<ChatTopic> = self
            .topics
            .iter()
            .filter(|entry| {
                assistant_id
                    .map(|id| entry.assistant_id == id)
                    .unwrap_or(true)
            })
            .map(|entry| entry.clone())
            .collect();
        topics.sort_by_key(|t| t.updated_at);
        topics.reverse();
        Ok(topics)
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage> {
        if !self.topics.contains_key(&message.topic_id) {
            return Err(AppError::NotFound("Topic".to_string()));
        }
        if let Some(parent_id) = message.parent_id {
            let parent_in_topic = self
                .messages
                .get(&parent_id)
                .map(|p| p.topic_id == message.topic_id)
                .unwrap_or(false);
            if !parent_in_topic {
                return Err(AppError::NotFound("Parent message".to_string()));
            }
        }

        let mut node = ChatMessage::new(
            message.topic_id,
            message.content,
            message.role,
            message.parent_id,
        );
        node.metadata = message.metadata;
        self.messages.insert(node.id, node.clone());

        if let Some(mut topic) = self.topics.get_mut(&message.topic_id) {
            topic.updated_at = Utc::now();
        }

        Ok(node)
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn find_messages_by_topic(&self, topic_id: Uuid) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|entry| entry.topic_id == topic_id)
            .map(|entry| entry.clone())
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Role;

    #[tokio::test]
    async fn rejects_parent_from_other_topic() {
        let store = MemoryMessageStore::new();
        let topic_a = store.create_topic("a", None).await.unwrap();
        let topic_b = store.create_topic("b", None).await.unwrap();

        let root = store
            .create_message(NewMessage {
                topic_id: topic_a.id,
                content: "hi".into(),
                role: Role::User,
                parent_id: None,
                metadata: None,
            })
            .await
            .unwrap();

        let cross = store
            .create_message(NewMessage {
                topic_id: topic_b.id,
                content: "bad".into(),
                role: Role::User,
                parent_id: Some(root.id),
                metadata: None,
            })
            .await;
        assert!(matches!(cross, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn messages_come_back_ordered_by_created_at() {
        let store = MemoryMessageStore::new();
        let topic = store.create_topic("a", None).await.unwrap();

        let mut parent = None;
        for content in ["one", "two", "three"] {
            let msg = store
                .create_message(NewMessage {
                    topic_id: topic.id,
                    content: content.into(),
                    role: Role::User,
                    parent_id: parent,
                    metadata: None,
                })
                .await
                .unwrap();
            parent = Some(msg.id);
        }

        let messages = store.find_messages_by_topic(topic.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }
}
