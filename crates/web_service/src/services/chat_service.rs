//! Persistence-facing chat operations: message creation and trace building.

use std::sync::Arc;

use uuid::Uuid;

use chat_core::{ChatMessage, ChatTopic, MessageMetadata, Role};

use crate::error::Result;
use crate::storage::{MessageStore, NewMessage};

/// Thin service over the message store. Holds no state of its own; every
/// call re-reads whatever it needs so results reflect a storage snapshot.
pub struct ChatService {
    store: Arc<dyn MessageStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Create a new message node. With a `parent_id` this is a reply or a
    /// branch; without one it starts the topic's root.
    pub async fn create_message(
        &self,
        topic_id: Uuid,
        content: impl Into<String>,
        role: Role,
        parent_id: Option<Uuid>,
        metadata: Option<MessageMetadata>,
    ) -> Result<ChatMessage> {
        self.store
            .create_message(NewMessage {
                topic_id,
                content: content.into(),
                role,
                parent_id,
                metadata,
            })
            .await
    }

    pub async fn create_topic(
        &self,
        assistant_id: &str,
        title: Option<String>,
    ) -> Result<ChatTopic> {
        self.store.create_topic(assistant_id, title).await
    }

    /// Chronological root-to-leaf message trace, used as model context.
    ///
    /// One batch fetch of the topic's messages, then an in-memory parent
    /// walk: a hundred-message topic costs one read, not a hundred.
    /// Messages created after the fetch are not included; the trace is a
    /// snapshot, nothing stronger.
    pub async fn get_trace(&self, leaf_message_id: Uuid) -> Result<Vec<ChatMessage>> {
        let Some(leaf) = self.store.find_message(leaf_message_id).await? else {
            return Ok(Vec::new());
        };

        let all_messages = self.store.find_messages_by_topic(leaf.topic_id).await?;
        let chain = chat_core::build_chain(&all_messages, leaf_message_id);

        tracing::debug!(
            leaf_id = %leaf_message_id,
            topic_id = %leaf.topic_id,
            trace_len = chain.len(),
            "trace built"
        );

        Ok(chain.into_iter().cloned().collect())
    }
}
