//! Chat turn endpoint: one POST, one SSE stream, one assistant reply.

use std::time::Duration;

use actix_web::{web, HttpResponse};
use actix_web_lab::{sse, util::InfallibleStream};
use log::info;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chat_core::parse_topic_id;

use crate::dto::ChatTurnRequest;
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::services::stream_handler::TurnEvent;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// In-flight turns grouped by topic. A topic can carry several simultaneous
/// turns (different branch points), each with its own cancellation token.
pub type TurnRegistry = dashmap::DashMap<Uuid, Vec<(Uuid, CancellationToken)>>;

fn register_turn(registry: &TurnRegistry, topic_id: Uuid, turn_id: Uuid, cancel: CancellationToken) {
    registry.entry(topic_id).or_default().push((turn_id, cancel));
}

/// Remove one settled turn. Other turns on the topic keep their tokens.
fn unregister_turn(registry: &TurnRegistry, topic_id: Uuid, turn_id: Uuid) {
    if let Some(mut turns) = registry.get_mut(&topic_id) {
        turns.retain(|(id, _)| *id != turn_id);
    }
    registry.remove_if(&topic_id, |_, turns| turns.is_empty());
}

/// Cancel every in-flight turn on the topic. Returns whether any was.
fn cancel_turns(registry: &TurnRegistry, topic_id: Uuid) -> bool {
    match registry.get(&topic_id) {
        Some(turns) if !turns.is_empty() => {
            for (_, cancel) in turns.iter() {
                cancel.cancel();
            }
            true
        }
        _ => false,
    }
}

fn turn_event_to_sse(event: &TurnEvent) -> Option<sse::Event> {
    let (name, payload) = match event {
        TurnEvent::Started {
            user_message_id,
            metadata,
        } => (
            "turn_started",
            json!({
                "user_message_id": user_message_id,
                "topic_id": metadata.topic_id,
                "parent_id": metadata.parent_id,
                "created_at": metadata.created_at,
            }),
        ),
        TurnEvent::Delta { text } => ("content_delta", json!({ "text": text })),
        TurnEvent::ToolResult { name, result } => {
            ("tool_result", json!({ "name": name, "result": result }))
        }
        TurnEvent::Completed { message } => ("turn_completed", json!({ "message": message })),
        TurnEvent::Aborted { message } => ("turn_aborted", json!({ "message": message })),
        TurnEvent::Error { message } => ("turn_error", json!({ "message": message })),
    };

    sse::Data::new_json(payload)
        .ok()
        .map(|data| sse::Event::Data(data.event(name)))
}

/// `POST /chat`: run one turn and stream the reply as SSE.
pub async fn send_turn(
    app_state: web::Data<AppState>,
    body: web::Json<ChatTurnRequest>,
) -> Result<sse::Sse<InfallibleStream<ReceiverStream<sse::Event>>>> {
    let request = body.into_inner();

    // Reject before any stream or side effect exists.
    let topic_id = app_state.stream_controller.preflight(&request).await?;
    info!("Starting chat turn for topic {}", topic_id);

    let cancel = CancellationToken::new();
    let turn_id = Uuid::new_v4();
    register_turn(&app_state.active_turns, topic_id, turn_id, cancel.clone());

    let (event_tx, mut event_rx) = mpsc::channel::<TurnEvent>(32);
    let (sse_tx, sse_rx) = mpsc::channel::<sse::Event>(32);

    let controller = app_state.stream_controller.clone();
    let active_turns = app_state.active_turns.clone();
    let turn_cancel = cancel.clone();
    tokio::spawn(async move {
        let result = controller
            .run_turn(request, turn_cancel, event_tx.clone())
            .await;
        if let Err(e) = result {
            tracing::error!(topic_id = %topic_id, error = %e, "chat turn failed");
            let _ = event_tx
                .send(TurnEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
        unregister_turn(&active_turns, topic_id, turn_id);
    });

    // Bridge turn events to SSE; a failed send means the client went away,
    // which cancels the turn like any other stop.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let is_terminal = matches!(
                event,
                TurnEvent::Completed { .. } | TurnEvent::Aborted { .. } | TurnEvent::Error { .. }
            );
            if let Some(sse_event) = turn_event_to_sse(&event) {
                if sse_tx.send(sse_event).await.is_err() {
                    cancel.cancel();
                    break;
                }
            }
            if is_terminal {
                let _ = sse_tx.send(sse::Event::Data(sse::Data::new("[DONE]"))).await;
                break;
            }
        }
    });

    Ok(sse::Sse::from_infallible_receiver(sse_rx).with_keep_alive(SSE_KEEP_ALIVE))
}

/// `POST /chat/{topic_id}/stop`: cancel the topic's in-flight turns, if any.
///
/// The server cannot tell a manual stop from a client-side stall timeout;
/// both land here (or arrive as a plain disconnect).
pub async fn stop_turn(
    app_state: web::Data<AppState>,
    topic_id: web::Path<String>,
) -> Result<HttpResponse> {
    let topic_id = parse_topic_id(&topic_id)
        .ok_or_else(|| AppError::Validation("malformed topic id".to_string()))?;

    let stopped = cancel_turns(&app_state.active_turns, topic_id);

    info!("Stop requested for topic {} (in flight: {})", topic_id, stopped);
    Ok(HttpResponse::Ok().json(json!({ "stopped": stopped })))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chat")
            .route("", web::post().to(send_turn))
            .route("/{topic_id}/stop", web::post().to(stop_turn)),
    );
}
