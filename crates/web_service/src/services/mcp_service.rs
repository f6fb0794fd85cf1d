//! Tool capability boundary.
//!
//! Tool servers (MCP or otherwise) are external collaborators; an
//! unreachable server contributes zero tools and a warning, never a failed
//! turn. Discovery fans out across all configured servers concurrently.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A tool as exposed to the model, tagged with the server that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub server_id: String,
    /// JSON schema for the tool arguments.
    pub parameters: serde_json::Value,
}

/// One configured tool server.
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn id(&self) -> &str;
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>>;
    async fn invoke(&self, tool_name: &str, args: serde_json::Value) -> anyhow::Result<String>;
}

/// Assistant-facing tool capability consumed by the turn controller.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Tools available for an assistant. Infallible by design: discovery
    /// failures degrade to an empty (or partial) toolset.
    async fn list_tools(&self, assistant_id: &str) -> Vec<ToolDescriptor>;

    async fn invoke(
        &self,
        server_id: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<String>;
}

/// Runtime over a set of configured tool servers.
pub struct McpToolRuntime {
    servers: Vec<Arc<dyn ToolServer>>,
}

impl McpToolRuntime {
    pub fn new(servers: Vec<Arc<dyn ToolServer>>) -> Self {
        Self { servers }
    }

    /// A runtime with no servers: every discovery yields zero tools.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ToolCapability for McpToolRuntime {
    async fn list_tools(&self, assistant_id: &str) -> Vec<ToolDescriptor> {
        let discoveries = join_all(self.servers.iter().map(|server| {
            let server = server.clone();
            async move { (server.id().to_string(), server.list_tools().await) }
        }))
        .await;

        let mut tools = Vec::new();
        for (server_id, result) in discoveries {
            match result {
                Ok(server_tools) => tools.extend(server_tools),
                Err(e) => {
                    tracing::warn!(
                        assistant_id,
                        server_id = %server_id,
                        error = %e,
                        "tool discovery failed for server, contributing zero tools"
                    );
                }
            }
        }

        tracing::debug!(assistant_id, tool_count = tools.len(), "tool discovery complete");
        tools
    }

    async fn invoke(
        &self,
        server_id: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<String> {
        let server = self
            .servers
            .iter()
            .find(|s| s.id() == server_id)
            .ok_or_else(|| anyhow::anyhow!("unknown tool server '{server_id}'"))?;

        tracing::info!(server_id, tool_name, "invoking tool");
        server.invoke(tool_name, args).await
    }
}
