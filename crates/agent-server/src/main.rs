//! mathgpt HTTP Server
//!
//! Axum-based server providing the chat REST API, a WebSocket endpoint that
//! streams the agent's steps, and the static WASM frontend.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use math_solver::{WikiClient, WikipediaClient, WikipediaConfig};

use crate::handlers::{
    chat_handler, chat_stream_handler, create_session, delete_session, get_session, health_check,
    list_models,
};
use crate::state::{AppState, ServerConfig};

/// Build the router; static files are served for every unmatched path
fn app(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))

        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))

        // Static files (WASM frontend)
        .fallback_service(ServeDir::new(static_dir))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    if config.default_api_key.is_some() {
        tracing::info!("✓ Server-side Groq API key configured");
    } else {
        tracing::warn!("⚠ GROQ_API_KEY not set - every request must carry its own key");
    }
    tracing::info!("Model: {} (max {} agent steps)", config.model, config.max_iterations);

    let wiki_config = WikipediaConfig::from_env();
    tracing::info!("Wikipedia language: {}", wiki_config.lang);
    let wiki: Arc<dyn WikiClient> = Arc::new(WikipediaClient::new(&wiki_config)?);

    let state = AppState::new(wiki, config);
    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into());
    let app = app(state, &static_dir);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 mathgpt server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check");
    tracing::info!("  GET    /api/models         - List available models");
    tracing::info!("  POST   /api/sessions       - Start a chat session");
    tracing::info!("  GET    /api/sessions/{{id}}  - Session transcript");
    tracing::info!("  DELETE /api/sessions/{{id}}  - End a session");
    tracing::info!("  POST   /api/chat           - Ask a question");
    tracing::info!("  GET    /api/chat/stream    - WebSocket streaming");
    tracing::info!("  Static files from {}", static_dir);
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use math_solver::MockWikiClient;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::new(Arc::new(MockWikiClient::new()), ServerConfig::default());
        app(state, "static")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["server_key_configured"], false);
    }

    #[tokio::test]
    async fn test_chat_without_key() {
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"Find the integral of sin(x)"}"#))
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "MISSING_API_KEY");
    }

    #[tokio::test]
    async fn test_session_routes() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(Request::post("/api/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        let id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(created["history"][0]["role"], "assistant");

        let uri = format!("/api/sessions/{id}");
        let response = app
            .clone()
            .oneshot(Request::delete(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
