//! OpenAI-compatible streaming client.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use crate::models::{ChatCompletionStreamChunk, ChatRequest, ProviderEndpoint, StreamEvent};
use crate::{ModelClientError, ModelClientTrait, Result};

/// Client for any provider speaking the OpenAI `chat/completions` protocol.
/// One shared HTTP client serves every provider endpoint.
#[derive(Default)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_body(request: &ChatRequest) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for message in &request.messages {
            messages.push(json!({ "role": message.role, "content": message.content }));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = serde_json::Value::Array(tools);
        }

        body
    }
}

#[async_trait]
impl ModelClientTrait for OpenAiCompatClient {
    async fn stream_chat(
        &self,
        endpoint: &ProviderEndpoint,
        request: ChatRequest,
        tx: Sender<Result<StreamEvent>>,
    ) -> Result<()> {
        let url = format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'));
        let body = Self::build_body(&request);

        info!(model = %request.model, messages = request.messages.len(), "sending streaming chat request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", endpoint.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "provider rejected chat request");
            return Err(ModelClientError::Provider { status, body });
        }

        let mut event_stream = response.bytes_stream().eventsource();
        while let Some(event_result) = event_stream.next().await {
            match event_result {
                Ok(message) => {
                    if message.data == "[DONE]" {
                        debug!("received [DONE], closing stream");
                        let _ = tx.send(Ok(StreamEvent::Done)).await;
                        break;
                    }
                    match serde_json::from_str::<ChatCompletionStreamChunk>(&message.data) {
                        Ok(chunk) => {
                            for event in chunk_to_events(&chunk) {
                                if tx.send(Ok(event)).await.is_err() {
                                    warn!("receiver dropped, abandoning stream");
                                    return Ok(());
                                }
                            }
                        }
                        Err(e) => {
                            // Skip unparseable chunks rather than killing
                            // the whole stream.
                            warn!(error = %e, data = %message.data, "failed to parse stream chunk");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "SSE stream failed");
                    let _ = tx
                        .send(Err(ModelClientError::Stream(e.to_string())))
                        .await;
                    break;
                }
            }
        }

        Ok(())
    }
}

fn chunk_to_events(chunk: &ChatCompletionStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in &chunk.choices {
        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::Delta(content.clone()));
            }
        }
        if let Some(tool_calls) = &choice.delta.tool_calls {
            for call in tool_calls {
                let Some(function) = &call.function else {
                    continue;
                };
                events.push(StreamEvent::ToolCall {
                    id: call.id.clone().unwrap_or_default(),
                    name: function.name.clone().unwrap_or_default(),
                    arguments: function.arguments.clone().unwrap_or_default(),
                });
            }
        }
        if choice.finish_reason.is_some() {
            events.push(StreamEvent::Done);
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestMessage, ToolDefinition};

    fn request_with_tools() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".into(),
            system_prompt: Some("be brief".into()),
            messages: vec![RequestMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            tools: vec![ToolDefinition {
                name: "search".into(),
                description: "search things".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
        }
    }

    #[test]
    fn body_includes_system_prompt_first() {
        let body = OpenAiCompatClient::build_body(&request_with_tools());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["stream"], true);
        assert_eq!(body["tools"][0]["function"]["name"], "search");
    }

    #[test]
    fn chunk_to_events_maps_delta_and_finish() {
        let chunk: ChatCompletionStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        let events = chunk_to_events(&chunk);
        assert_eq!(
            events,
            vec![StreamEvent::Delta("Hi".into()), StreamEvent::Done]
        );
    }
}
