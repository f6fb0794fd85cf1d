//! Streaming session controller: one assistant turn per request.
//!
//! A turn validates the request, persists the user message, builds the
//! model context from the message tree, streams the reply, and reconciles
//! the outcome with storage. Completion and abort are mutually exclusive:
//! a single `settled` flag guards persistence so a turn can never write the
//! assistant reply twice.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chat_core::{parse_topic_id, ChatMessage, MessageMetadata, Role};
use model_client::{
    ChatRequest, ModelClientTrait, ProviderEndpoint, RequestMessage, StreamEvent, ToolDefinition,
};

use crate::dto::{ChatTurnRequest, TurnMetadata};
use crate::error::{AppError, Result};
use crate::services::assistant_registry::AssistantRegistry;
use crate::services::chat_service::ChatService;
use crate::services::mcp_service::{ToolCapability, ToolDescriptor};

/// Upper bound on model→tool→model round trips within one turn.
const MAX_TOOL_STEPS: usize = 5;

/// Events forwarded to the client while a turn runs.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// The user message is durably persisted; streaming may begin.
    Started {
        user_message_id: Uuid,
        metadata: TurnMetadata,
    },
    /// Incremental assistant text.
    Delta { text: String },
    /// A tool invocation finished (successfully or not).
    ToolResult { name: String, result: String },
    /// Terminal: the turn completed naturally.
    Completed { message: Option<ChatMessage> },
    /// Terminal: the turn was cancelled; any partial reply is persisted.
    Aborted { message: Option<ChatMessage> },
    /// Terminal: the turn failed.
    Error { message: String },
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    Completed(Option<ChatMessage>),
    Aborted(Option<ChatMessage>),
}

pub struct StreamController {
    chat_service: Arc<ChatService>,
    assistants: Arc<AssistantRegistry>,
    model_client: Arc<dyn ModelClientTrait>,
    tools: Arc<dyn ToolCapability>,
}

impl StreamController {
    pub fn new(
        chat_service: Arc<ChatService>,
        assistants: Arc<AssistantRegistry>,
        model_client: Arc<dyn ModelClientTrait>,
        tools: Arc<dyn ToolCapability>,
    ) -> Self {
        Self {
            chat_service,
            assistants,
            model_client,
            tools,
        }
    }

    /// Read-only request checks, shared with the HTTP layer so a bad
    /// request is rejected with a proper status before any SSE stream or
    /// side effect exists.
    pub async fn preflight(&self, request: &ChatTurnRequest) -> Result<Uuid> {
        let topic_id = parse_topic_id(&request.topic_id)
            .ok_or_else(|| AppError::Validation("malformed topic id".to_string()))?;
        if request.content.trim().is_empty() {
            return Err(AppError::Validation("content must not be empty".to_string()));
        }
        if self.chat_service.store().find_topic(topic_id).await?.is_none() {
            return Err(AppError::NotFound("Topic".to_string()));
        }
        self.assistants.resolve_for_chat(&request.assistant_id)?;
        Ok(topic_id)
    }

    /// Run one turn. Events flow through `events_tx`; `cancel` aborts the
    /// stream cooperatively (manual stop, client timeout, or disconnect all
    /// look identical here).
    pub async fn run_turn(
        &self,
        request: ChatTurnRequest,
        cancel: CancellationToken,
        events_tx: mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome> {
        // Validation and assistant resolution happen before any side
        // effect: malformed requests, unknown topics/assistants, and
        // assistants without a provider binding are all rejected here.
        let topic_id = self.preflight(&request).await?;
        let assistant = self.assistants.resolve_for_chat(&request.assistant_id)?;
        let endpoint = assistant
            .provider
            .as_ref()
            .map(|p| ProviderEndpoint {
                base_url: p.base_url.clone(),
                api_key: p.api_key.clone(),
            })
            .ok_or_else(|| AppError::NotConfigured(assistant.id.clone()))?;

        // Persist the user message first; it is the branch point for the
        // assistant reply and survives any later failure.
        let user_message = self
            .chat_service
            .create_message(
                topic_id,
                request.content.clone(),
                Role::User,
                request.parent_id,
                None,
            )
            .await?;

        tracing::info!(
            topic_id = %topic_id,
            user_message_id = %user_message.id,
            parent_id = ?request.parent_id,
            "turn started"
        );

        let metadata = TurnMetadata {
            topic_id,
            parent_id: request.parent_id,
            created_at: user_message.created_at,
        };
        let _ = events_tx
            .send(TurnEvent::Started {
                user_message_id: user_message.id,
                metadata,
            })
            .await;

        // Model context comes from the active path through the tree.
        let trace = self.chat_service.get_trace(user_message.id).await?;

        // Tool discovery fans out per server; failures degrade to fewer
        // tools rather than failing the turn.
        let tool_descriptors = self.tools.list_tools(&request.assistant_id).await;

        let mut messages: Vec<RequestMessage> = trace
            .iter()
            .map(|m| RequestMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let tool_definitions: Vec<ToolDefinition> = tool_descriptors
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect();

        // Stream, accumulating text, looping through bounded tool round
        // trips.
        let mut full_text = String::new();
        let mut settled = false;

        for step in 0..MAX_TOOL_STEPS {
            let chat_request = ChatRequest {
                model: assistant.model_id.clone(),
                system_prompt: assistant.system_prompt.clone(),
                messages: messages.clone(),
                tools: tool_definitions.clone(),
            };

            let consumed = self
                .consume_stream(&endpoint, chat_request, &cancel, &events_tx, &mut full_text)
                .await?;

            match consumed {
                StreamEnd::Aborted => {
                    let persisted = self
                        .persist_partial(topic_id, user_message.id, &full_text, &mut settled)
                        .await?;
                    let _ = events_tx
                        .send(TurnEvent::Aborted {
                            message: persisted.clone(),
                        })
                        .await;
                    return Ok(TurnOutcome::Aborted(persisted));
                }
                StreamEnd::Finished { tool_calls } if !tool_calls.is_empty() => {
                    if step + 1 == MAX_TOOL_STEPS {
                        tracing::warn!(topic_id = %topic_id, "tool step limit reached, finishing turn");
                        break;
                    }
                    self.execute_tool_round(
                        &tool_descriptors,
                        tool_calls,
                        &mut messages,
                        &events_tx,
                    )
                    .await;
                    // Next loop iteration streams the follow-up.
                }
                StreamEnd::Finished { .. } => break,
            }
        }

        // Persist the completed reply, if any text arrived.
        let persisted = if !settled && !full_text.is_empty() {
            let message = self
                .chat_service
                .create_message(
                    topic_id,
                    full_text.clone(),
                    Role::Assistant,
                    Some(user_message.id),
                    None,
                )
                .await?;
            tracing::info!(
                topic_id = %topic_id,
                assistant_message_id = %message.id,
                content_len = message.content.len(),
                "turn completed"
            );
            Some(message)
        } else {
            None
        };

        let _ = events_tx
            .send(TurnEvent::Completed {
                message: persisted.clone(),
            })
            .await;
        Ok(TurnOutcome::Completed(persisted))
    }

    /// Drive one model stream to its end, forwarding deltas and collecting
    /// tool calls. Cancellation wins over any racing chunk.
    async fn consume_stream(
        &self,
        endpoint: &ProviderEndpoint,
        chat_request: ChatRequest,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<TurnEvent>,
        full_text: &mut String,
    ) -> Result<StreamEnd> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<model_client::Result<StreamEvent>>(32);

        let client = self.model_client.clone();
        let endpoint = endpoint.clone();
        let error_tx = chunk_tx.clone();
        let stream_task = tokio::spawn(async move {
            // Errors returned by the client (as opposed to mid-stream Err
            // items it already emitted) still have to reach the consumer.
            if let Err(e) = client.stream_chat(&endpoint, chat_request, chunk_tx).await {
                tracing::error!(error = %e, "model stream task failed");
                let _ = error_tx.send(Err(e)).await;
            }
        });

        let mut tool_calls: Vec<PendingToolCall> = Vec::new();

        loop {
            tokio::select! {
                // Abort always runs before cleanup so partial output is
                // never silently dropped.
                biased;

                _ = cancel.cancelled() => {
                    stream_task.abort();
                    return Ok(StreamEnd::Aborted);
                }

                chunk = chunk_rx.recv() => {
                    match chunk {
                        Some(Ok(StreamEvent::Delta(text))) => {
                            full_text.push_str(&text);
                            if events_tx.send(TurnEvent::Delta { text }).await.is_err() {
                                // Receiver gone: the client disconnected.
                                tracing::warn!("client disconnected mid-stream, aborting turn");
                                stream_task.abort();
                                return Ok(StreamEnd::Aborted);
                            }
                        }
                        Some(Ok(StreamEvent::ToolCall { id, name, arguments })) => {
                            tool_calls.push(PendingToolCall { id, name, arguments });
                        }
                        Some(Ok(StreamEvent::Done)) | None => {
                            return Ok(StreamEnd::Finished { tool_calls });
                        }
                        Some(Err(e)) => {
                            stream_task.abort();
                            return Err(AppError::ModelError(e));
                        }
                    }
                }
            }
        }
    }

    /// Execute collected tool calls and fold their results back into the
    /// transcript for the follow-up stream. Tool failures become failed
    /// tool results, never fatal turn errors.
    async fn execute_tool_round(
        &self,
        descriptors: &[ToolDescriptor],
        tool_calls: Vec<PendingToolCall>,
        messages: &mut Vec<RequestMessage>,
        events_tx: &mpsc::Sender<TurnEvent>,
    ) {
        for call in tool_calls {
            let args: serde_json::Value =
                serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);

            let result = match descriptors.iter().find(|d| d.name == call.name) {
                Some(descriptor) => self
                    .tools
                    .invoke(&descriptor.server_id, &call.name, args)
                    .await
                    .unwrap_or_else(|e| format!("tool '{}' failed: {}", call.name, e)),
                None => format!("tool '{}' is not available", call.name),
            };

            let _ = events_tx
                .send(TurnEvent::ToolResult {
                    name: call.name.clone(),
                    result: result.clone(),
                })
                .await;

            messages.push(RequestMessage {
                role: "assistant".to_string(),
                content: format!("[tool call {}: {}({})]", call.id, call.name, call.arguments),
            });
            messages.push(RequestMessage {
                role: "tool".to_string(),
                content: result,
            });
        }
    }

    /// Persist whatever text accumulated before the abort, flagged
    /// incomplete + stopped. Nothing is written for an empty partial.
    async fn persist_partial(
        &self,
        topic_id: Uuid,
        user_message_id: Uuid,
        full_text: &str,
        settled: &mut bool,
    ) -> Result<Option<ChatMessage>> {
        if *settled || full_text.is_empty() {
            return Ok(None);
        }
        *settled = true;

        let message = self
            .chat_service
            .create_message(
                topic_id,
                full_text.to_string(),
                Role::Assistant,
                Some(user_message_id),
                Some(MessageMetadata::stopped_partial()),
            )
            .await?;

        tracing::info!(
            topic_id = %topic_id,
            assistant_message_id = %message.id,
            content_len = message.content.len(),
            "partial reply persisted after abort"
        );
        Ok(Some(message))
    }
}

struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

enum StreamEnd {
    Finished { tool_calls: Vec<PendingToolCall> },
    Aborted,
}
