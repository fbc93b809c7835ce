//! `/api/whatsapp` routes: thin handlers over the shared `SessionManager`.
//!
//! | Route            | Method | Purpose                                   |
//! |------------------|--------|-------------------------------------------|
//! | `/connect`       | GET    | start pairing or report progress          |
//! | `/status`        | GET    | flags plus the current QR image           |
//! | `/disconnect`    | POST   | tear the session down                     |
//! | `/send`          | POST   | send a text message                       |
//! | `/messages`      | GET    | recent individual chats                   |
//! | `/messages`      | POST   | recent messages of one chat               |

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use zapdesk_core::types::{ChatMessage, ChatSummary, MessageDirection};
use zapdesk_session::{SessionError, SessionManager};

use crate::error::ApiError;
use crate::qr::render_pairing_image;

/// Prefix all routes are mounted under.
pub const API_PREFIX: &str = "/api/whatsapp";

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub session: SessionManager,
}

impl AppState {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }
}

/// Build the router with every `/api/whatsapp` route.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/connect", get(connect))
        .route("/status", get(status))
        .route("/disconnect", post(disconnect))
        .route("/send", post(send))
        .route("/messages", get(list_chats).post(fetch_messages));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<String>,
}

impl ConnectResponse {
    fn status(status: &'static str) -> Self {
        Self {
            status,
            qr_code: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    connected: bool,
    initializing: bool,
    qr_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SendRequest {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    success: bool,
    message_id: String,
}

#[derive(Debug, Serialize)]
struct ChatsResponse {
    chats: Vec<ChatSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchMessagesRequest {
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageView {
    id: String,
    body: String,
    direction: MessageDirection,
    timestamp: i64,
    #[serde(rename = "type")]
    kind: String,
}

impl From<ChatMessage> for MessageView {
    fn from(msg: ChatMessage) -> Self {
        Self {
            direction: msg.direction(),
            id: msg.id,
            body: msg.body,
            timestamp: msg.timestamp,
            kind: msg.kind,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    messages: Vec<MessageView>,
}

/// Treat a malformed JSON body as an empty one so field checks produce the error.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "unreadable request body");
            T::default()
        }
    }
}

/// Trimmed, non-empty value of an optional field.
fn required(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

async fn connect(State(state): State<AppState>) -> Result<Json<ConnectResponse>, ApiError> {
    let session = &state.session;
    let current = session.status();

    if current.connected {
        return Ok(Json(ConnectResponse::status("connected")));
    }

    if current.initializing {
        return Ok(Json(match session.pairing_code() {
            Some(code) => ConnectResponse {
                status: "waiting_qr",
                qr_code: Some(render_pairing_image(&code)?),
            },
            None => ConnectResponse::status("initializing"),
        }));
    }

    info!("starting whatsapp connect from api");
    let session = session.clone();
    tokio::spawn(async move {
        if let Err(e) = session.connect().await {
            error!(error = %e, "background whatsapp connect failed");
        }
    });

    Ok(Json(ConnectResponse::status("initializing")))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = &state.session;
    let current = session.status();

    let qr_code = session
        .pairing_code()
        .and_then(|code| match render_pairing_image(&code) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "failed to render pairing code");
                None
            }
        });

    Json(StatusResponse {
        connected: current.connected,
        initializing: current.initializing,
        qr_code,
    })
}

async fn disconnect(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.session.disconnect().await;
    Json(SuccessResponse { success: true })
}

async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let request = body_or_default(body);
    let (Some(to), Some(message)) = (required(request.to), required(request.message)) else {
        return Err(ApiError::BadRequest("to and message are required".into()));
    };

    let sent = state.session.send_message(&to, &message).await?;

    Ok(Json(SendResponse {
        success: true,
        message_id: sent.id,
    }))
}

async fn list_chats(State(state): State<AppState>) -> Result<Json<ChatsResponse>, ApiError> {
    let session = &state.session;
    if !session.status().connected {
        return Err(SessionError::NotConnected.into());
    }

    let chats = session.list_chats().await?;
    Ok(Json(ChatsResponse { chats }))
}

async fn fetch_messages(
    State(state): State<AppState>,
    body: Result<Json<FetchMessagesRequest>, JsonRejection>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Some(chat_id) = required(body_or_default(body).chat_id) else {
        return Err(ApiError::BadRequest("chatId is required".into()));
    };

    let session = &state.session;
    let client = match session.client() {
        Some(client) if session.status().connected => client,
        _ => return Err(SessionError::NotConnected.into()),
    };

    let messages = client
        .fetch_messages(&chat_id, session.settings().max_messages)
        .await
        .map_err(SessionError::from)?;

    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
