//! API Client

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use wasm_bindgen::{JsCast, closure::Closure};
use web_sys::{CloseEvent, MessageEvent, WebSocket};

/// Transcript entry for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Successful answer from `/api/chat`
#[derive(Clone, Debug, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub session_id: String,
    pub history: Vec<ChatMessage>,
}

/// One agent step as streamed by the server
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepEvent {
    Token { text: String },
    Thought { text: String },
    Action { tool: String, input: String },
    Observation { tool: String, output: String },
    ParseError { message: String },
    FinalAnswer { text: String },
}

impl StepEvent {
    /// Line for the thoughts panel; tokens are shown as a live draft instead
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::Token { .. } => None,
            Self::Thought { text } => Some(format!("Thought: {text}")),
            Self::Action { tool, input } => Some(format!("Action: {tool}\nAction Input: {input}")),
            Self::Observation { output, .. } => Some(format!("Observation: {output}")),
            Self::ParseError { message } => Some(format!("Observation: {message}")),
            Self::FinalAnswer { text } => Some(format!("Final Answer: {text}")),
        }
    }
}

/// Frame received on `/api/chat/stream`
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Step { event: StepEvent },
    Answer(ChatReply),
    Error { error: String },
}

fn parse_frame(text: &str) -> StreamFrame {
    serde_json::from_str(text).unwrap_or_else(|e| StreamFrame::Error {
        error: format!("Unreadable message from the server: {e}"),
    })
}

/// reqwest needs absolute URLs in the browser
fn endpoint(path: &str) -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());
    format!("{origin}{path}")
}

fn stream_endpoint() -> String {
    let location = web_sys::window().map(|w| w.location());
    let protocol = location
        .as_ref()
        .and_then(|l| l.protocol().ok())
        .unwrap_or_else(|| "http:".into());
    let host = location
        .as_ref()
        .and_then(|l| l.host().ok())
        .unwrap_or_else(|| "localhost:3000".into());
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    format!("{scheme}://{host}/api/chat/stream")
}

/// Build the `/api/chat` body; the session is omitted until the server has issued one
fn chat_body(message: &str, api_key: &str, session_id: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "message": message,
        "api_key": api_key,
    });

    if let Some(id) = session_id {
        body["session_id"] = serde_json::json!(id);
    }
    body
}

/// Ask a question within a session
pub async fn send_chat(
    message: &str,
    api_key: &str,
    session_id: Option<&str>,
) -> Result<ChatReply, String> {
    let response = reqwest::Client::new()
        .post(endpoint("/api/chat"))
        .json(&chat_body(message, api_key, session_id))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        let data: serde_json::Value = response.json().await.unwrap_or_default();
        Err(data["error"].as_str().unwrap_or("Request failed").to_string())
    }
}

/// Ask a question over the WebSocket, handing every frame to `on_frame`.
///
/// Each call ends with exactly one `Answer` or `Error` frame; the socket is
/// closed after it.
pub fn stream_chat(
    message: &str,
    api_key: &str,
    session_id: Option<&str>,
    on_frame: impl FnMut(StreamFrame) + 'static,
) -> Result<(), String> {
    let socket = WebSocket::new(&stream_endpoint()).map_err(|e| format!("{e:?}"))?;
    let body = chat_body(message, api_key, session_id).to_string();
    let on_frame = Rc::new(RefCell::new(on_frame));
    let finished = Rc::new(Cell::new(false));

    let onopen = {
        let socket = socket.clone();
        Closure::<dyn FnMut()>::new(move || {
            if let Err(e) = socket.send_with_str(&body) {
                leptos::logging::warn!("Could not send question: {e:?}");
            }
        })
    };

    let onmessage = {
        let socket = socket.clone();
        let on_frame = Rc::clone(&on_frame);
        let finished = Rc::clone(&finished);
        Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            let Some(text) = ev.data().as_string() else {
                return;
            };
            let frame = parse_frame(&text);
            let last = !matches!(frame, StreamFrame::Step { .. });
            if last {
                finished.set(true);
            }
            (on_frame.borrow_mut())(frame);
            if last {
                let _ = socket.close();
            }
        })
    };

    let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |_: CloseEvent| {
        if !finished.replace(true) {
            (on_frame.borrow_mut())(StreamFrame::Error {
                error: "Connection to the server was lost.".into(),
            });
        }
    });

    socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));

    // Handlers live as long as the socket, which JS owns.
    onopen.forget();
    onmessage.forget();
    onclose.forget();
    Ok(())
}

/// Discard a session on the server
pub async fn end_session(session_id: &str) -> Result<(), String> {
    let response = reqwest::Client::new()
        .delete(endpoint(&format!("/api/sessions/{session_id}")))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err("Failed to end session".into())
    }
}
