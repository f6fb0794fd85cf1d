//! End-to-end turn tests against in-memory storage and a scripted model
//! client: completion, abort reconciliation, and failure ordering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chat_core::{AssistantConfig, ProviderConfig, Role};
use model_client::{
    ChatRequest, ModelClientError, ModelClientTrait, ProviderEndpoint, StreamEvent,
};
use web_service::dto::ChatTurnRequest;
use web_service::error::AppError;
use web_service::services::stream_handler::{StreamController, TurnEvent, TurnOutcome};
use web_service::services::{AssistantRegistry, ChatService, McpToolRuntime};
use web_service::storage::{MemoryMessageStore, MessageStore};

enum Script {
    /// Deltas followed by a clean finish.
    Complete(Vec<&'static str>),
    /// Deltas, then the stream hangs until cancelled.
    StallAfter(Vec<&'static str>),
    /// The provider rejects the request outright.
    Fail,
}

struct ScriptedClient {
    script: Script,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelClientTrait for ScriptedClient {
    async fn stream_chat(
        &self,
        _endpoint: &ProviderEndpoint,
        request: ChatRequest,
        tx: mpsc::Sender<model_client::Result<StreamEvent>>,
    ) -> model_client::Result<()> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::Complete(parts) => {
                for part in parts {
                    let _ = tx.send(Ok(StreamEvent::Delta(part.to_string()))).await;
                }
                let _ = tx.send(Ok(StreamEvent::Done)).await;
                Ok(())
            }
            Script::StallAfter(parts) => {
                for part in parts {
                    let _ = tx.send(Ok(StreamEvent::Delta(part.to_string()))).await;
                }
                std::future::pending::<()>().await;
                Ok(())
            }
            Script::Fail => Err(ModelClientError::Stream("provider unavailable".to_string())),
        }
    }
}

fn registry() -> AssistantRegistry {
    AssistantRegistry::new(vec![
        AssistantConfig {
            id: "helper".to_string(),
            name: "Helper".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            system_prompt: Some("You are helpful.".to_string()),
            provider: Some(ProviderConfig {
                base_url: "http://localhost:9999/v1".to_string(),
                api_key: "test-key".to_string(),
            }),
        },
        AssistantConfig {
            id: "unbound".to_string(),
            name: "Unbound".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            system_prompt: None,
            provider: None,
        },
    ])
}

struct Harness {
    store: Arc<MemoryMessageStore>,
    client: Arc<ScriptedClient>,
    controller: Arc<StreamController>,
}

fn harness(script: Script) -> Harness {
    let store = Arc::new(MemoryMessageStore::new());
    let client = Arc::new(ScriptedClient::new(script));
    let controller = Arc::new(StreamController::new(
        Arc::new(ChatService::new(store.clone())),
        Arc::new(registry()),
        client.clone(),
        Arc::new(McpToolRuntime::empty()),
    ));
    Harness {
        store,
        client,
        controller,
    }
}

fn turn_request(topic_id: &str, content: &str) -> ChatTurnRequest {
    ChatTurnRequest {
        topic_id: topic_id.to_string(),
        assistant_id: "helper".to_string(),
        parent_id: None,
        content: content.to_string(),
    }
}

#[tokio::test]
async fn completed_turn_persists_user_and_assistant_messages() {
    let h = harness(Script::Complete(vec!["Hello", " world"]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let outcome = h
        .controller
        .run_turn(
            turn_request(&topic.id.to_string(), "hi"),
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap();

    let reply = match outcome {
        TurnOutcome::Completed(Some(message)) => message,
        other => panic!("expected completed turn, got {other:?}"),
    };
    assert_eq!(reply.content, "Hello world");
    assert_eq!(reply.role, Role::Assistant);
    assert!(reply.metadata.is_none());

    let messages = h.store.find_messages_by_topic(topic.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    let user = messages.iter().find(|m| m.role == Role::User).unwrap();
    assert_eq!(reply.parent_id, Some(user.id));

    // Terminal event mirrors the outcome.
    let mut saw_completed = false;
    while let Some(event) = rx.recv().await {
        if let TurnEvent::Completed { message } = event {
            assert_eq!(message.unwrap().id, reply.id);
            saw_completed = true;
        }
    }
    assert!(saw_completed);
}

#[tokio::test]
async fn aborted_turn_persists_partial_with_both_flags() {
    let h = harness(Script::StallAfter(vec!["Hello, I think..."]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let controller = h.controller.clone();
        let cancel = cancel.clone();
        let request = turn_request(&topic.id.to_string(), "hi");
        async move { controller.run_turn(request, cancel, tx).await }
    });

    // Cancel once the scripted delta has arrived.
    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::Delta { .. }) {
            break;
        }
    }
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    let partial = match outcome {
        TurnOutcome::Aborted(Some(message)) => message,
        other => panic!("expected aborted turn with partial, got {other:?}"),
    };
    assert_eq!(partial.content, "Hello, I think...");
    let metadata = partial.metadata.unwrap();
    assert!(metadata.incomplete);
    assert!(metadata.stopped);

    let messages = h.store.find_messages_by_topic(topic.id).await.unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn abort_before_any_text_persists_no_assistant_message() {
    let h = harness(Script::StallAfter(vec![]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let controller = h.controller.clone();
        let cancel = cancel.clone();
        let request = turn_request(&topic.id.to_string(), "hi");
        async move { controller.run_turn(request, cancel, tx).await }
    });

    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::Started { .. }) {
            break;
        }
    }
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, TurnOutcome::Aborted(None)));

    // Only the user message survives.
    let messages = h.store.find_messages_by_topic(topic.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn validation_rejects_before_any_side_effect() {
    let h = harness(Script::Complete(vec!["unused"]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, _rx) = mpsc::channel(32);
    let err = h
        .controller
        .run_turn(
            turn_request(&topic.id.to_string(), "   "),
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let (tx, _rx) = mpsc::channel(32);
    let err = h
        .controller
        .run_turn(
            turn_request("not-a-uuid", "hi"),
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let messages = h.store.find_messages_by_topic(topic.id).await.unwrap();
    assert!(messages.is_empty());
    assert!(h.client.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_assistant_and_unbound_assistant_are_distinct_errors() {
    let h = harness(Script::Complete(vec!["unused"]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let mut request = turn_request(&topic.id.to_string(), "hi");
    request.assistant_id = "ghost".to_string();
    let (tx, _rx) = mpsc::channel(32);
    let err = h
        .controller
        .run_turn(request, CancellationToken::new(), tx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut request = turn_request(&topic.id.to_string(), "hi");
    request.assistant_id = "unbound".to_string();
    let (tx, _rx) = mpsc::channel(32);
    let err = h
        .controller
        .run_turn(request, CancellationToken::new(), tx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotConfigured(_)));
}

#[tokio::test]
async fn provider_failure_keeps_user_message_but_no_reply() {
    let h = harness(Script::Fail);
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, _rx) = mpsc::channel(32);
    let err = h
        .controller
        .run_turn(
            turn_request(&topic.id.to_string(), "hi"),
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ModelError(_)));

    let messages = h.store.find_messages_by_topic(topic.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn second_turn_sends_full_trace_as_model_context() {
    let h = harness(Script::Complete(vec!["first reply"]));
    let topic = h.store.create_topic("helper", None).await.unwrap();

    let (tx, _rx) = mpsc::channel(32);
    let outcome = h
        .controller
        .run_turn(
            turn_request(&topic.id.to_string(), "first question"),
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap();
    let first_reply = match outcome {
        TurnOutcome::Completed(Some(message)) => message,
        other => panic!("expected completed turn, got {other:?}"),
    };

    let mut request = turn_request(&topic.id.to_string(), "second question");
    request.parent_id = Some(first_reply.id);
    let (tx, _rx) = mpsc::channel(32);
    h.controller
        .run_turn(request, CancellationToken::new(), tx)
        .await
        .unwrap();

    let requests = h.client.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let context: Vec<(&str, &str)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role.as_str(), m.content.as_str()))
        .collect();
    assert_eq!(
        context,
        vec![
            ("user", "first question"),
            ("assistant", "first reply"),
            ("user", "second question"),
        ]
    );
}

#[tokio::test]
async fn preflight_rejects_unknown_topic() {
    let h = harness(Script::Complete(vec![]));

    let request = turn_request(&uuid::Uuid::new_v4().to_string(), "hi");
    let err = h.controller.preflight(&request).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
