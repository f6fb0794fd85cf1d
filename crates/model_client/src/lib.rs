//! model_client - streaming boundary to a model provider
//!
//! The rest of the system talks to models through [`ModelClientTrait`]: a
//! request goes in, incremental [`StreamEvent`]s come back over a channel,
//! and the stream terminates by finishing (`Done`), erroring (an `Err`
//! item), or the caller dropping the receiver / cancelling the task.
//!
//! [`OpenAiCompatClient`] implements the trait against any
//! OpenAI-compatible `chat/completions` endpoint.

pub mod error;
pub mod models;
pub mod openai;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

pub use error::ModelClientError;
pub use models::{
    ChatRequest, ProviderEndpoint, RequestMessage, StreamEvent, ToolDefinition,
};
pub use openai::OpenAiCompatClient;

pub type Result<T, E = ModelClientError> = std::result::Result<T, E>;

#[async_trait]
pub trait ModelClientTrait: Send + Sync {
    /// Stream one chat completion against `endpoint`. Events are delivered
    /// through `tx`; the method returns once the stream has terminated.
    /// Dropping the receiver cancels the stream cooperatively.
    async fn stream_chat(
        &self,
        endpoint: &ProviderEndpoint,
        request: ChatRequest,
        tx: Sender<Result<StreamEvent>>,
    ) -> Result<()>;
}
