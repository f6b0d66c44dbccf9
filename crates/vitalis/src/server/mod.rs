//! HTTP chat server
//!
//! Thin axum layer over the chat pipeline: one chat endpoint plus health,
//! per-user memory stats, and a memory clear endpoint. Memory failures never
//! surface here; only agent failures produce an error status.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::chat::ChatPipeline;
use crate::config::ServerConfig;
use crate::error::{Result, VitalisError};
use crate::memory::MemoryCoordinator;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub coordinator: Arc<MemoryCoordinator>,
}

/// The chat server
pub struct ChatServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ChatServer {
    pub fn new(
        config: ServerConfig,
        pipeline: Arc<ChatPipeline>,
        coordinator: Arc<MemoryCoordinator>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                pipeline,
                coordinator,
            }),
        }
    }

    /// Start the server and listen for requests.
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeout_secs,
            )));

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| VitalisError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting chat server on {addr}");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VitalisError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| VitalisError::Server(format!("Server error: {e}")))?;

        tracing::info!("Chat server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/stats/{user_id}", get(stats_handler))
        .route("/memory/{user_id}", delete(clear_memory_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_user_id")]
    user_id: String,
    /// Omitted on the first request; the response echoes the session to use
    /// for follow-ups.
    #[serde(default)]
    session_id: Option<String>,
}

fn default_user_id() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    #[serde(default)]
    session_id: Option<String>,
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty_message", "Message is empty");
    }

    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state
        .pipeline
        .handle_turn(&request.user_id, &session_id, &request.message)
        .await
    {
        Ok(output) => {
            let mut body = serde_json::to_value(&output).unwrap_or_default();
            if let Some(map) = body.as_object_mut() {
                map.insert("session_id".to_string(), session_id.into());
            }
            Json(body).into_response()
        }
        Err(e) => {
            tracing::error!("Chat turn failed: {e}");
            error_response(
                StatusCode::BAD_GATEWAY,
                "agent_unavailable",
                "The assistant could not generate a response",
            )
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Response {
    let session_id = query.session_id.unwrap_or_default();
    let stats = state.coordinator.get_memory_stats(&user_id, &session_id).await;
    Json(stats).into_response()
}

async fn clear_memory_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    let cleared = state.coordinator.clear_all_memories(&user_id).await;
    if cleared {
        Json(serde_json::json!({"cleared": true})).into_response()
    } else {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "clear_failed",
            "One or more memory tiers failed to clear",
        )
    }
}

/// Create a JSON error response
fn error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });
    (status, Json(body)).into_response()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{MemoryConfig, ValidationConfig};
    use crate::testing::{ScriptedAgent, test_coordinator};

    fn test_state() -> Arc<AppState> {
        let coordinator = Arc::new(test_coordinator(&MemoryConfig::default()));
        let pipeline = Arc::new(ChatPipeline::new(
            coordinator.clone(),
            Arc::new(ScriptedAgent::default()),
            &ValidationConfig::default(),
        ));
        Arc::new(AppState {
            pipeline,
            coordinator,
        })
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_request(uri: &str, method: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_chat_goal_setting_round_trip() {
        let app = create_router(test_state());

        let response = app
            .oneshot(json_request(
                "/chat",
                "POST",
                serde_json::json!({
                    "user_id": "u1",
                    "message": "my goal is to reach 150 lbs",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("150 lbs"));
        assert!(body.contains("\"intent\":\"goal_setting\""));
        assert!(body.contains("\"session_id\""));
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let app = create_router(test_state());

        let response = app
            .oneshot(json_request(
                "/chat",
                "POST",
                serde_json::json!({"message": "   "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("empty_message"));
    }

    #[tokio::test]
    async fn test_chat_agent_failure_returns_bad_gateway() {
        let coordinator = Arc::new(test_coordinator(&MemoryConfig::default()));
        let pipeline = Arc::new(ChatPipeline::new(
            coordinator.clone(),
            Arc::new(ScriptedAgent::failing()),
            &ValidationConfig::default(),
        ));
        let app = create_router(Arc::new(AppState {
            pipeline,
            coordinator,
        }));

        let response = app
            .oneshot(json_request(
                "/chat",
                "POST",
                serde_json::json!({"message": "how did I sleep?"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_string(response).await.contains("agent_unavailable"));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats/u1?session_id=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("\"short_term_turns\""));
        assert!(body.contains("\"writes\""));
    }

    #[tokio::test]
    async fn test_clear_memory_endpoint() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/memory/u1")
                    .method("DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"cleared\":true"));
    }
}
