use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info};
use model_client::{ModelClientTrait, OpenAiCompatClient};

use crate::config::ServiceConfig;
use crate::controllers::chat_controller::TurnRegistry;
use crate::controllers::{assistant_controller, chat_controller, topic_controller};
use crate::services::{
    AssistantRegistry, ChatService, McpToolRuntime, StreamController, ToolCapability,
};
use crate::storage::{FileMessageStore, MemoryMessageStore, MessageStore};

const DEFAULT_WORKER_COUNT: usize = 10;

pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub assistants: Arc<AssistantRegistry>,
    pub stream_controller: Arc<StreamController>,
    /// Cancellation tokens for turns currently streaming, grouped by topic.
    pub active_turns: Arc<TurnRegistry>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        assistants: Arc<AssistantRegistry>,
        model_client: Arc<dyn ModelClientTrait>,
        tools: Arc<dyn ToolCapability>,
    ) -> Self {
        let stream_controller = Arc::new(StreamController::new(
            chat_service.clone(),
            assistants.clone(),
            model_client,
            tools,
        ));
        Self {
            chat_service,
            assistants,
            stream_controller,
            active_turns: Arc::new(TurnRegistry::default()),
        }
    }
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(chat_controller::config)
            .configure(topic_controller::config)
            .configure(assistant_controller::config),
    );
}

async fn build_state(config: &ServiceConfig) -> Result<AppState, String> {
    let store: Arc<dyn MessageStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileMessageStore::new(dir)),
        None => Arc::new(MemoryMessageStore::new()),
    };

    let assistants = match &config.assistants_file {
        Some(path) => AssistantRegistry::load(path)
            .await
            .map_err(|e| format!("Failed to load assistant registry: {e}"))?,
        None => AssistantRegistry::new(Vec::new()),
    };

    Ok(AppState::new(
        Arc::new(ChatService::new(store)),
        Arc::new(assistants),
        Arc::new(OpenAiCompatClient::new()),
        Arc::new(McpToolRuntime::empty()),
    ))
}

pub async fn run(config: ServiceConfig) -> Result<(), String> {
    info!("Starting chat service...");

    let port = config.port;
    let app_state = web::Data::new(build_state(&config).await?);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(DEFAULT_WORKER_COUNT)
    .bind(format!("127.0.0.1:{port}"))
    .map_err(|e| format!("Failed to bind server: {e}"))?
    .run();

    info!("Chat service listening on http://127.0.0.1:{port}");

    if let Err(e) = server.await {
        error!("Web server error: {}", e);
        return Err(format!("Web server error: {e}"));
    }

    Ok(())
}
