use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use validator::Validate;

use crate::agent::{SelfRagAgent, SessionStore};
use crate::providers::traits::CompletionProvider;
use crate::retrieval::{GraphRetriever, HybridRetriever};

#[derive(Clone)]
pub struct AppState {
    agent: Arc<SelfRagAgent>,
    sessions: Arc<SessionStore>,
    hybrid: Arc<HybridRetriever>,
    graph: GraphRetriever,
    provider: Arc<dyn CompletionProvider + Send + Sync>,
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 1000))]
    message: String,
    /// Conversations with the same thread id share memory.
    thread_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 1000))]
    question: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    response: String,
    thread_id: String,
    tokens: TokenInfo,
}

#[derive(Serialize)]
pub struct TokenInfo {
    input: usize,
    response: usize,
    total: usize,
}

#[derive(Serialize)]
pub struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

/// Create and configure the API router
pub async fn create_api(
    agent: SelfRagAgent,
    hybrid: HybridRetriever,
    graph: GraphRetriever,
    provider: Box<dyn CompletionProvider + Send + Sync>,
) -> Router {
    let state = AppState {
        agent: Arc::new(agent),
        sessions: Arc::new(SessionStore::new()),
        hybrid: Arc::new(hybrid),
        graph,
        provider: Arc::from(provider),
    };

    // Fully permissive CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/ask", post(ask_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Stateful chat through the self-correcting retrieval loop. Reuses the
/// conversation behind the given thread id, or opens a fresh one.
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                status: format!("Invalid request: {}", e),
            }),
        )
            .into_response();
    }

    let thread_id = request
        .thread_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let input_tokens = request.message.split_whitespace().count();

    let mut session = state.sessions.load(&thread_id);
    let answer = match state.agent.run(&mut session, &request.message).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Agent error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse {
                    status: format!("Agent error: {}", e),
                }),
            )
                .into_response();
        }
    };
    state.sessions.save(&thread_id, session);

    let response_tokens = answer.split_whitespace().count();
    Json(ChatResponse {
        response: answer,
        thread_id,
        tokens: TokenInfo {
            input: input_tokens,
            response: response_tokens,
            total: input_tokens + response_tokens,
        },
    })
    .into_response()
}

/// Stateless question answering over the hybrid retriever.
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                status: format!("Invalid request: {}", e),
            }),
        )
            .into_response();
    }

    match state
        .hybrid
        .ask(state.provider.as_ref(), &request.question)
        .await
    {
        Ok(answer) => Json(AskResponse { answer }).into_response(),
        Err(e) => {
            eprintln!("Hybrid ask failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse {
                    status: format!("Ask error: {}", e),
                }),
            )
                .into_response()
        }
    }
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.graph.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse {
                status: format!("Stats error: {}", e),
            }),
        )
            .into_response(),
    }
}

async fn health_check() -> Response {
    Json(ApiResponse {
        status: "Server is running and healthy".to_string(),
    })
    .into_response()
}
