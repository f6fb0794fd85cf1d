pub mod assistant_registry;
pub mod chat_service;
pub mod mcp_service;
pub mod stream_handler;

pub use assistant_registry::AssistantRegistry;
pub use chat_service::ChatService;
pub use mcp_service::{McpToolRuntime, ToolCapability, ToolDescriptor};
pub use stream_handler::{StreamController, TurnOutcome};
