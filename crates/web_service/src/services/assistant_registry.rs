//! Read-only assistant registry.
//!
//! Assistants and their provider bindings are loaded once from a JSON file
//! (settings CRUD is outside this service). Resolution distinguishes an
//! unknown assistant from one that exists but has no usable provider.

use std::collections::HashMap;
use std::path::Path;

use chat_core::AssistantConfig;

use crate::error::{AppError, Result};

#[derive(Default)]
pub struct AssistantRegistry {
    assistants: HashMap<String, AssistantConfig>,
}

impl AssistantRegistry {
    pub fn new(assistants: Vec<AssistantConfig>) -> Self {
        Self {
            assistants: assistants.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let assistants: Vec<AssistantConfig> = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.as_ref().display(),
            count = assistants.len(),
            "assistant registry loaded"
        );
        Ok(Self::new(assistants))
    }

    pub fn list(&self) -> Vec<&AssistantConfig> {
        let mut assistants: Vec<&AssistantConfig> = self.assistants.values().collect();
        assistants.sort_by(|a, b| a.id.cmp(&b.id));
        assistants
    }

    pub fn get(&self, id: &str) -> Option<&AssistantConfig> {
        self.assistants.get(id)
    }

    /// Resolve an assistant for a chat turn: missing ⇒ `NotFound`,
    /// present without provider ⇒ `NotConfigured`.
    pub fn resolve_for_chat(&self, id: &str) -> Result<&AssistantConfig> {
        let assistant = self
            .assistants
            .get(id)
            .ok_or_else(|| AppError::NotFound("Assistant".to_string()))?;
        if assistant.provider.is_none() {
            return Err(AppError::NotConfigured(assistant.id.clone()));
        }
        Ok(assistant)
    }
}
