//! REST API Server for the finance agent
//!
//! Each chat id owns one agent (and so one conversation) behind an async
//! mutex; concurrent requests on the same chat run one after another.
//! Requests without a chat id run on a one-shot agent that is never stored.

use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::agent::{AgentFactory, ReactAgent, TaskPreset};
use crate::events::{AgentEvent, ChannelSink, CollectingSink};
use crate::models::{AgentOutcome, Termination};

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub chat_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub answer: String,
    pub termination: Termination,
    pub iterations: usize,
    pub events: Vec<AgentEvent>,
}

#[derive(Debug, Serialize)]
pub struct PresetInfo {
    pub id: TaskPreset,
    pub name: &'static str,
    pub command: &'static str,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

type Session = Arc<Mutex<ReactAgent>>;

#[derive(Clone)]
pub struct ApiState {
    factory: AgentFactory,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl ApiState {
    pub fn new(factory: AgentFactory) -> Self {
        Self {
            factory,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Agent for `chat_id`, created on first use
    pub async fn session(&self, chat_id: &str) -> Session {
        if let Some(session) = self.sessions.read().await.get(chat_id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(chat_id.to_string())
            .or_insert_with(|| {
                info!(chat_id, "New chat session");
                Arc::new(Mutex::new(self.factory.build()))
            })
            .clone()
    }

    /// Stored session for a known chat id, otherwise a one-shot agent
    pub async fn agent_for(&self, chat_id: Option<&str>) -> Session {
        match chat_id {
            Some(chat_id) => self.session(chat_id).await,
            None => Arc::new(Mutex::new(self.factory.build())),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn drop_session(&self, chat_id: &str) -> bool {
        self.sessions.write().await.remove(chat_id).is_some()
    }
}

/// Trimmed chat id (if any) and message, or a client error
fn validate(
    req: &ChatRequest,
) -> Result<(Option<String>, String), (StatusCode, Json<ApiResponse>)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        ));
    }

    let chat_id = req
        .chat_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Ok((chat_id, message.to_string()))
}

/// =============================
/// Health & Presets
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_presets() -> Json<ApiResponse> {
    let presets: Vec<PresetInfo> = TaskPreset::ALL
        .iter()
        .map(|preset| PresetInfo {
            id: *preset,
            name: preset.name(),
            command: preset.command(),
        })
        .collect();
    Json(ApiResponse::success(presets))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let (chat_id, message) = match validate(&req) {
        Ok(valid) => valid,
        Err(rejection) => return rejection,
    };
    info!(chat_id = ?chat_id, "Received chat message");

    let session = state.agent_for(chat_id.as_deref()).await;
    let sink = CollectingSink::new();
    let outcome = session.lock().await.respond(&message, &sink).await;

    if outcome.termination == Termination::BackendError {
        error!(chat_id = ?chat_id, "Chat run failed: {}", outcome.answer);
        return (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(outcome.answer)),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(ChatReply {
            chat_id,
            answer: outcome.answer,
            termination: outcome.termination,
            iterations: outcome.iterations,
            events: sink.into_events(),
        })),
    )
}

fn agent_event(event: &AgentEvent) -> Event {
    Event::default()
        .event("agent")
        .json_data(event)
        .unwrap_or_else(|_| Event::default().event("error").data("unserializable event"))
}

fn outcome_event(chat_id: Option<&str>, outcome: &AgentOutcome) -> Event {
    Event::default()
        .event("outcome")
        .json_data(serde_json::json!({
            "chat_id": chat_id,
            "answer": outcome.answer,
            "termination": outcome.termination,
            "iterations": outcome.iterations,
        }))
        .unwrap_or_else(|_| Event::default().event("error").data("unserializable outcome"))
}

/// Same input as `/api/chat`; streams agent events as they happen, then the outcome.
async fn chat_stream_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let (chat_id, message) = match validate(&req) {
        Ok(valid) => valid,
        Err(rejection) => return rejection.into_response(),
    };
    info!(chat_id = ?chat_id, "Received streaming chat message");

    let session = state.agent_for(chat_id.as_deref()).await;
    let (sink, mut events) = ChannelSink::new();
    let run = tokio::spawn(async move {
        let mut agent = session.lock().await;
        agent.respond(&message, &sink).await
    });

    let stream = stream! {
        while let Some(event) = events.recv().await {
            yield Ok::<Event, Infallible>(agent_event(&event));
        }
        match run.await {
            Ok(outcome) => yield Ok(outcome_event(chat_id.as_deref(), &outcome)),
            Err(e) => {
                error!(chat_id = ?chat_id, "Streaming run crashed: {}", e);
                yield Ok(Event::default().event("error").data(e.to_string()));
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

async fn reset_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> Json<ApiResponse> {
    let existed = state.drop_session(&chat_id).await;
    info!(chat_id = %chat_id, existed, "Chat session reset");
    Json(ApiResponse::success(serde_json::json!({
        "chat_id": chat_id,
        "reset": existed,
    })))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/presets", get(list_presets))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/chat/:chat_id/reset", post(reset_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
