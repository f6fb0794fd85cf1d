use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use chat_core::{ChatMessage, ChatTopic};

use crate::error::{AppError, Result};

use super::provider::{MessageStore, NewMessage};

/// One JSON document per topic under the base directory.
#[derive(Serialize, Deserialize)]
struct TopicDocument {
    topic: ChatTopic,
    messages: Vec<ChatMessage>,
}

/// File-backed store. Writes are serialized through a mutex so concurrent
/// sibling creation on one topic cannot interleave read-modify-write.
pub struct FileMessageStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMessageStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn topic_path(&self, id: Uuid) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }

    async fn load_document(&self, topic_id: Uuid) -> Result<Option<TopicDocument>> {
        let path = self.topic_path(topic_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let document: TopicDocument = serde_json::from_str(&content)?;
        Ok(Some(document))
    }

    async fn save_document(&self, document: &TopicDocument) -> Result<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).await?;
        }
        let path = self.topic_path(document.topic.id);
        let content = serde_json::to_string_pretty(document)?;

        tracing::debug!(
            topic_id = %document.topic.id,
            path = %path.display(),
            message_count = document.messages.len(),
            "file store: writing topic document"
        );

        fs::write(&path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn create_topic(&self, assistant_id: &str, title: Option<String>) -> Result<ChatTopic> {
        let _guard = self.write_lock.lock().await;
        let topic = ChatTopic::new(assistant_id, title);
        let document = TopicDocument {
            topic: topic.clone(),
            messages: Vec::new(),
        };
        self.save_document(&document).await?;

        tracing::info!(topic_id = %topic.id, assistant_id, "file store: topic created");
        Ok(topic)
    }

    async fn find_topic(&self, id: Uuid) -> Result<Option<ChatTopic>> {
        Ok(self.load_document(id).await?.map(|d| d.topic))
    }

    async fn list_topics(&self, assistant_id: Option<&str>) -> Result<Vec<ChatTopic>> {
        let mut topics = Vec::new();
        if !self.base_dir.exists() {
            return Ok(topics);
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<TopicDocument>(&content) {
                Ok(document) => {
                    let matches = assistant_id
                        .map(|id| document.topic.assistant_id == id)
                        .unwrap_or(true);
                    if matches {
                        topics.push(document.topic);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file store: skipping unreadable topic document");
                }
            }
        }

        topics.sort_by_key(|t| t.updated_at);
        topics.reverse();
        Ok(topics)
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage> {
        let _guard = self.write_lock.lock().await;

        let mut document = self
            .load_document(message.topic_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Topic".to_string()))?;

        if let Some(parent_id) = message.parent_id {
            if !document.messages.iter().any(|m| m.id == parent_id) {
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

        document.messages.push(node.clone());
        document.topic.updated_at = Utc::now();
        self.save_document(&document).await?;

        tracing::info!(
            topic_id = %message.topic_id,
            message_id = %node.id,
            role = %node.role,
            parent_id = ?node.parent_id,
            "file store: message persisted"
        );

        Ok(node)
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        // Message ids do not encode their topic; scan documents.
        if !self.base_dir.exists() {
            return Ok(None);
        }
        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            if let Ok(document) = serde_json::from_str::<TopicDocument>(&content) {
                if let Some(found) = document.messages.into_iter().find(|m| m.id == id) {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    async fn find_messages_by_topic(&self, topic_id: Uuid) -> Result<Vec<ChatMessage>> {
        let mut messages = self
            .load_document(topic_id)
            .await?
            .map(|d| d.messages)
            .unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}
