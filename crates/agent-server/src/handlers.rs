//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{Path, Query, State, WebSocketUpgrade, ws::{Message as WsMessage, WebSocket}},
    http::StatusCode,
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedMutexGuard, mpsc};

use agent_core::{
    AgentError, ChatSession, LlmProvider, Message, SessionId, SessionStore,
    provider::ModelInfo,
};
use math_solver::MathAssistant;

use crate::state::AppState;

const MISSING_API_KEY: &str = "Please enter your Groq API key to continue.";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub server_key_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub model: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub title: String,
    pub active: bool,
    pub history: Vec<Message>,
}

impl From<&ChatSession> for SessionResponse {
    fn from(session: &ChatSession) -> Self {
        Self {
            session_id: session.id.to_string(),
            title: session.title(),
            active: session.active,
            history: session.transcript().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn missing_key() -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "MISSING_API_KEY", MISSING_API_KEY)
}

fn session_not_found(id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "SESSION_NOT_FOUND",
        format!("Session '{id}' does not exist."),
    )
}

/// Map an agent failure onto a status and UI-safe text
fn agent_error(err: &AgentError) -> ApiError {
    match err {
        AgentError::EmptyQuestion => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_QUESTION", err.user_message())
        }
        AgentError::Provider(_)
        | AgentError::ProviderUnavailable(_)
        | AgentError::RateLimited(_)
        | AgentError::Auth(_) => api_error(StatusCode::BAD_GATEWAY, "AGENT_ERROR", err.user_message()),
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR", err.user_message()),
    }
}

// ============================================================================
// Submission plumbing shared by HTTP and WebSocket
// ============================================================================

/// Everything needed to run one question
struct Submission {
    assistant: MathAssistant,
    session: ChatSession,
    model: String,
    /// Held until the session is saved back
    _lock: Option<OwnedMutexGuard<()>>,
}

/// Load a stored session while holding its lock
async fn checkout(
    state: &AppState,
    id: &str,
) -> Result<(ChatSession, OwnedMutexGuard<()>), ApiError> {
    let lock = state.lock_session(id).await;
    let loaded = state
        .sessions
        .load(&SessionId::from_string(id))
        .map_err(|e| agent_error(&e))?;

    match loaded {
        Some(session) => Ok((session, lock)),
        None => {
            drop(lock);
            state.forget_session(id);
            Err(session_not_found(id))
        }
    }
}

/// Validate a request and check its session out of the store.
///
/// The key is checked before the question, and nothing is contacted until
/// both pass. Submissions to one session run one at a time.
async fn prepare(state: &AppState, request: &ChatRequest) -> Result<Submission, ApiError> {
    let api_key = state
        .resolve_key(request.api_key.as_deref())
        .ok_or_else(missing_key)?;

    if request.message.trim().is_empty() {
        return Err(agent_error(&AgentError::EmptyQuestion));
    }

    let (session, lock) = match request.session_id.as_deref() {
        Some(id) => {
            let (session, lock) = checkout(state, id).await?;
            (session, Some(lock))
        }
        None => (ChatSession::new(), None),
    };

    let model = state.model_for(request.model.as_deref());
    let assistant = state.assistant(&api_key, &model).map_err(|e| agent_error(&e))?;

    Ok(Submission {
        assistant,
        session,
        model,
        _lock: lock,
    })
}

/// Store the session back and build the reply
fn finish(
    state: &AppState,
    session: &ChatSession,
    model: String,
    answer: String,
) -> Result<ChatResponse, ApiError> {
    state.sessions.save(session).map_err(|e| agent_error(&e))?;

    Ok(ChatResponse {
        message: answer,
        session_id: session.id.to_string(),
        model,
        history: session.transcript().to_vec(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.config.model.clone(),
        server_key_configured: state.config.default_api_key.is_some(),
    })
}

/// Models available to the given key
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    let api_key = state
        .resolve_key(query.api_key.as_deref())
        .ok_or_else(missing_key)?;
    let provider = state.provider(&api_key).map_err(|e| agent_error(&e))?;

    let models = provider.list_models().await.map_err(|e| {
        tracing::error!("Model listing failed: {}", e);
        agent_error(&e)
    })?;

    Ok(Json(models))
}

/// Start a session seeded with the greeting
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = ChatSession::new();
    state.sessions.save(&session).map_err(|e| agent_error(&e))?;

    tracing::info!(session = %session.id, "Session created");
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// Transcript of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .sessions
        .load(&SessionId::from_string(&id))
        .map_err(|e| agent_error(&e))?
        .ok_or_else(|| session_not_found(&id))?;

    Ok(Json(SessionResponse::from(&session)))
}

/// End a session and discard its transcript
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Waits for a running submission so its save cannot resurrect the session.
    let (mut session, lock) = checkout(&state, &id).await?;

    session.end();
    state.sessions.delete(&session.id).map_err(|e| agent_error(&e))?;
    drop(lock);
    state.forget_session(&id);

    tracing::info!(session = %id, turns = session.message_count(), "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// Main chat endpoint (non-streaming)
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Submission {
        assistant,
        mut session,
        model,
        _lock,
    } = prepare(&state, &payload).await?;

    let answer = assistant
        .submit(&mut session, &payload.message)
        .await
        .map_err(|e| {
            tracing::error!("Agent error: {}", e);
            agent_error(&e)
        })?;

    finish(&state, &session, model, answer).map(Json)
}

/// WebSocket streaming chat
pub async fn chat_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

fn error_frame(err: &ApiError) -> WsMessage {
    let (_, Json(body)) = err;
    let frame = serde_json::json!({"type": "error", "error": body.error, "code": body.code});
    WsMessage::Text(frame.to_string().into())
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    run_stream(sender, receiver, state).await;
}

/// Serve chat requests arriving as text frames, one at a time
async fn run_stream<S, R, E>(mut sender: S, mut receiver: R, state: AppState)
where
    S: Sink<WsMessage> + Unpin,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let request: ChatRequest = match serde_json::from_str(&msg) {
            Ok(r) => r,
            Err(e) => {
                let err = api_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string());
                let _ = sender.send(error_frame(&err)).await;
                continue;
            }
        };

        let Submission {
            assistant,
            mut session,
            model,
            _lock,
        } = match prepare(&state, &request).await {
            Ok(s) => s,
            Err(err) => {
                let _ = sender.send(error_frame(&err)).await;
                continue;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let question = request.message;
        let run = tokio::spawn(async move {
            let result = assistant.submit_with_events(&mut session, &question, &tx).await;
            (result, session)
        });

        // The channel closes when the run finishes and drops its sender.
        let mut connected = true;
        while let Some(event) = rx.recv().await {
            if !connected {
                continue;
            }
            let frame = serde_json::json!({"type": "step", "event": event});
            if sender.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                connected = false;
            }
        }

        let frame = match run.await {
            Ok((Ok(answer), session)) => match finish(&state, &session, model, answer) {
                Ok(reply) => {
                    let frame = serde_json::json!({
                        "type": "answer",
                        "message": reply.message,
                        "session_id": reply.session_id,
                        "model": reply.model,
                        "history": reply.history,
                    });
                    WsMessage::Text(frame.to_string().into())
                }
                Err(err) => error_frame(&err),
            },
            Ok((Err(e), _)) => {
                tracing::error!("Agent error: {}", e);
                error_frame(&agent_error(&e))
            }
            Err(e) => {
                tracing::error!("Agent task failed: {}", e);
                error_frame(&agent_error(&AgentError::Other(e.to_string())))
            }
        };

        if !connected || sender.send(frame).await.is_err() {
            break;
        }
    }
}
