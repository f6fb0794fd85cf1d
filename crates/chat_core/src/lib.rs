//! chat_core - Core types and pure algorithms for the chat system
//!
//! This crate provides the foundational pieces shared by the server and the
//! client-state crates:
//! - `message` - ChatMessage, Role, MessageMetadata, ChatTopic, AssistantConfig
//! - `tree` - message-tree algorithms (chain reconstruction, siblings, leaves)
//! - `topic_id` - topic id validation

pub mod message;
pub mod topic_id;
pub mod tree;

// Re-export commonly used types
pub use message::{AssistantConfig, ChatMessage, ChatTopic, MessageMetadata, ProviderConfig, Role};
pub use topic_id::parse_topic_id;
pub use tree::{
    build_chain, find_siblings, get_children_map, get_default_leaf, get_default_leaf_from,
};
