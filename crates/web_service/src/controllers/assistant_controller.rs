//! Read-only assistant views. Provider/API-key management lives outside
//! this service; these endpoints only expose what chat needs.

use actix_web::{web, HttpResponse};

use crate::dto::AssistantSummary;
use crate::error::{AppError, Result};
use crate::server::AppState;

fn summarize(assistant: &chat_core::AssistantConfig) -> AssistantSummary {
    AssistantSummary {
        id: assistant.id.clone(),
        name: assistant.name.clone(),
        model_id: assistant.model_id.clone(),
        configured: assistant.provider.is_some(),
    }
}

pub async fn list_assistants(app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let summaries: Vec<AssistantSummary> = app_state
        .assistants
        .list()
        .into_iter()
        .map(summarize)
        .collect();
    Ok(HttpResponse::Ok().json(summaries))
}

pub async fn get_assistant(
    app_state: web::Data<AppState>,
    assistant_id: web::Path<String>,
) -> Result<HttpResponse> {
    let assistant = app_state
        .assistants
        .get(&assistant_id)
        .ok_or_else(|| AppError::NotFound("Assistant".to_string()))?;
    Ok(HttpResponse::Ok().json(summarize(assistant)))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/assistants")
            .route("", web::get().to(list_assistants))
            .route("/{assistant_id}", web::get().to(get_assistant)),
    );
}
