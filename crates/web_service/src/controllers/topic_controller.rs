//! Topic endpoints: create a conversation, fetch it with its message tree.

use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;

use chat_core::parse_topic_id;

use crate::dto::{CreateTopicRequest, TopicResponse, TopicWithMessages};
use crate::error::{AppError, Result};
use crate::server::AppState;

pub async fn create_topic(
    app_state: web::Data<AppState>,
    body: web::Json<CreateTopicRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    if request.assistant_id.trim().is_empty() {
        return Err(AppError::Validation("assistant_id is required".to_string()));
    }
    if app_state.assistants.get(&request.assistant_id).is_none() {
        return Err(AppError::NotFound("Assistant".to_string()));
    }

    let topic = app_state
        .chat_service
        .create_topic(&request.assistant_id, request.title)
        .await?;

    info!("Created topic {} for assistant {}", topic.id, topic.assistant_id);
    Ok(HttpResponse::Created().json(topic))
}

/// The topic with its full message set; the client rebuilds branch paths
/// from the `parent_id` links.
pub async fn get_topic(
    app_state: web::Data<AppState>,
    topic_id: web::Path<String>,
) -> Result<HttpResponse> {
    let topic_id = parse_topic_id(&topic_id)
        .ok_or_else(|| AppError::Validation("malformed topic id".to_string()))?;

    let topic = app_state
        .chat_service
        .store()
        .find_topic(topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic".to_string()))?;

    let messages = app_state
        .chat_service
        .store()
        .find_messages_by_topic(topic_id)
        .await?;

    Ok(HttpResponse::Ok().json(TopicResponse {
        topic: TopicWithMessages { topic, messages },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListTopicsQuery {
    pub assistant_id: Option<String>,
}

pub async fn list_topics(
    app_state: web::Data<AppState>,
    query: web::Query<ListTopicsQuery>,
) -> Result<HttpResponse> {
    let topics = app_state
        .chat_service
        .store()
        .list_topics(query.assistant_id.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(topics))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/topics")
            .route("", web::post().to(create_topic))
            .route("", web::get().to(list_topics))
            .route("/{topic_id}", web::get().to(get_topic)),
    );
}
