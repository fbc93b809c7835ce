//! Bridge client: WebSocket client for a Node.js WhatsApp Web bridge.
//!
//! Architecture:
//! - A Node.js bridge process drives WhatsApp Web in a headless browser
//! - This client connects to it as a WebSocket **client** (default `ws://localhost:3001`)
//! - Events: the bridge pushes `{"type":"qr"|"ready"|"message"|...}` JSON frames
//! - Requests: we send `{"type":"send"|"getChats"|..., "requestId":"..."}` and the
//!   bridge answers with `{"type":"response","requestId":"...","ok":bool,...}`
//!
//! One `BridgeClient` maps to one connect attempt; the session manager asks
//! the [`BridgeFactory`] for a fresh client every time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use zapdesk_core::config::WhatsAppConfig;
use zapdesk_core::types::{Chat, ChatMessage, InboundMessage, SentMessage};

use crate::error::TransportError;
use crate::transport::{ClientFactory, ClientOptions, EventSender, MessagingClient, TransportEvent};

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// Default bridge WebSocket URL.
pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:3001";

/// Error code the bridge reports when the browser profile is still locked.
const BUSY_CODE: &str = "EBUSY";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSender = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

type RequestResult = Result<Value, TransportError>;
type PendingMap = Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<RequestResult>>>>;

// ─────────────────────────────────────────────
// BridgeFactory
// ─────────────────────────────────────────────

/// Builds [`BridgeClient`]s pointed at one bridge URL.
#[derive(Clone, Debug)]
pub struct BridgeFactory {
    bridge_url: String,
}

impl BridgeFactory {
    pub fn new(bridge_url: impl Into<String>) -> Self {
        let url = bridge_url.into();
        Self {
            bridge_url: if url.is_empty() {
                DEFAULT_BRIDGE_URL.to_string()
            } else {
                url
            },
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(config.bridge_url.clone())
    }

    pub fn bridge_url(&self) -> &str {
        &self.bridge_url
    }
}

impl ClientFactory for BridgeFactory {
    fn create(
        &self,
        options: &ClientOptions,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingClient>, TransportError> {
        Ok(Arc::new(BridgeClient::new(
            self.bridge_url.clone(),
            options.clone(),
            events,
        )))
    }
}

// ─────────────────────────────────────────────
// BridgeClient
// ─────────────────────────────────────────────

/// One WebSocket session with the bridge.
pub struct BridgeClient {
    bridge_url: String,
    options: ClientOptions,
    events: EventSender,
    /// Active WebSocket write half.
    ws_write: Arc<Mutex<Option<WsSender>>>,
    /// Requests waiting for their `response` frame, by request id.
    pending: PendingMap,
    /// Stops the reader task.
    shutdown: Arc<Notify>,
    /// Set once `destroy()` starts; a socket close after that is not a disconnect.
    closing: Arc<AtomicBool>,
}

impl BridgeClient {
    pub fn new(bridge_url: String, options: ClientOptions, events: EventSender) -> Self {
        Self {
            bridge_url,
            options,
            events,
            ws_write: Arc::new(Mutex::new(None)),
            pending: Arc::new(std::sync::Mutex::new(HashMap::new())),
            shutdown: Arc::new(Notify::new()),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Write one JSON frame to the bridge.
    async fn send_frame(&self, frame: &Value) -> Result<(), TransportError> {
        let mut guard = self.ws_write.lock().await;
        let write = guard.as_mut().ok_or(TransportError::NotStarted)?;
        write
            .send(WsMessage::text(frame.to_string()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    /// Issue a request and wait for its response, bounded by the request timeout.
    async fn request(&self, kind: &str, mut payload: Value) -> RequestResult {
        let request_id = Uuid::new_v4().to_string();
        payload["type"] = json!(kind);
        payload["requestId"] = json!(request_id);

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id.clone(), tx);

        if let Err(e) = self.send_frame(&payload).await {
            lock_pending(&self.pending).remove(&request_id);
            return Err(e);
        }
        debug!(request = kind, request_id = %request_id, "bridge request sent");

        match tokio::time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                lock_pending(&self.pending).remove(&request_id);
                warn!(request = kind, request_id = %request_id, "bridge request timed out");
                Err(TransportError::Timeout {
                    request: kind.to_string(),
                    secs: self.options.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: Value,
    ) -> Result<T, TransportError> {
        let data = self.request(kind, payload).await?;
        Ok(serde_json::from_value(data)?)
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn initialize(&self) -> Result<(), TransportError> {
        debug!(url = %self.bridge_url, "connecting to whatsapp bridge");
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.bridge_url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        info!(url = %self.bridge_url, "connected to whatsapp bridge");

        let (write, read) = ws_stream.split();
        *self.ws_write.lock().await = Some(write);

        tokio::spawn(read_loop(
            read,
            self.events.clone(),
            self.pending.clone(),
            self.shutdown.clone(),
            self.closing.clone(),
        ));

        self.send_frame(&json!({
            "type": "init",
            "clientId": self.options.client_id,
            "authDir": self.options.auth_dir.display().to_string(),
            "headless": self.options.headless,
            "sandbox": self.options.sandbox,
        }))
        .await
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> Result<SentMessage, TransportError> {
        self.request_as("send", json!({ "to": chat_id, "text": body }))
            .await
    }

    async fn get_chats(&self) -> Result<Vec<Chat>, TransportError> {
        self.request_as("getChats", json!({})).await
    }

    async fn fetch_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        self.request_as("fetchMessages", json!({ "chatId": chat_id, "limit": limit }))
            .await
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.closing.store(true, Ordering::SeqCst);

        let started = self.ws_write.lock().await.is_some();
        let result = if started {
            self.request("destroy", json!({})).await.map(|_| ())
        } else {
            Ok(())
        };

        if let Some(mut write) = self.ws_write.lock().await.take() {
            let _ = write.send(WsMessage::Close(None)).await;
        }
        self.shutdown.notify_one();
        fail_pending(&self.pending);

        debug!("whatsapp bridge client destroyed");
        result
    }
}

// ─────────────────────────────────────────────
// Reader task
// ─────────────────────────────────────────────

async fn read_loop(
    read: WsReader,
    events: EventSender,
    pending: PendingMap,
    shutdown: Arc<Notify>,
    closing: Arc<AtomicBool>,
) {
    let reason = read_frames(read, &events, &pending, &shutdown).await;

    fail_pending(&pending);
    if closing.load(Ordering::SeqCst) {
        debug!("whatsapp bridge reader stopped");
    } else {
        warn!(reason = %reason, "whatsapp bridge connection lost");
        let _ = events.send(TransportEvent::Disconnected(reason));
    }
}

/// Dispatch frames until the socket ends; returns why it ended.
async fn read_frames(
    mut read: WsReader,
    events: &EventSender,
    pending: &PendingMap,
    shutdown: &Notify,
) -> String {
    loop {
        tokio::select! {
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        error!(error = %e, "whatsapp ws read error");
                        return format!("bridge connection error: {e}");
                    }
                    None => return "bridge connection ended".to_string(),
                };

                let text = match msg {
                    WsMessage::Text(t) => t.to_string(),
                    WsMessage::Close(_) => return "bridge closed connection".to_string(),
                    _ => continue,
                };

                handle_frame(&text, events, pending);
            }
            _ = shutdown.notified() => return "shutdown".to_string(),
        }
    }
}

fn handle_frame(raw: &str, events: &EventSender, pending: &PendingMap) {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "invalid json frame from whatsapp bridge");
            return;
        }
    };

    if payload["type"] == "response" {
        complete_request(&payload, pending);
    } else if let Some(event) = parse_event(&payload) {
        let _ = events.send(event);
    }
}

fn complete_request(payload: &Value, pending: &PendingMap) {
    let Some(request_id) = payload["requestId"].as_str() else {
        warn!("bridge response without requestId");
        return;
    };
    let Some(tx) = lock_pending(pending).remove(request_id) else {
        debug!(request_id = request_id, "bridge response for unknown request");
        return;
    };
    let _ = tx.send(response_result(payload));
}

/// Turn a `response` frame into the request's result.
fn response_result(payload: &Value) -> RequestResult {
    if payload["ok"].as_bool().unwrap_or(false) {
        return Ok(payload["data"].clone());
    }

    let message = payload["error"]
        .as_str()
        .unwrap_or("unknown bridge error")
        .to_string();
    match payload["code"].as_str() {
        Some(BUSY_CODE) => Err(TransportError::ResourceBusy(message)),
        _ => Err(TransportError::Remote(message)),
    }
}

/// Map a bridge event frame to a transport event.
///
/// Returns `None` for frames that are only logged.
pub(crate) fn parse_event(payload: &Value) -> Option<TransportEvent> {
    let frame_type = payload["type"].as_str().unwrap_or("");

    match frame_type {
        "qr" => match payload["qr"].as_str() {
            Some(qr) if !qr.is_empty() => Some(TransportEvent::PairingCode(qr.to_string())),
            _ => {
                warn!("whatsapp bridge sent qr frame without a code");
                None
            }
        },
        "authenticated" => Some(TransportEvent::Authenticated),
        "ready" => Some(TransportEvent::Ready),
        "auth_failure" => Some(TransportEvent::AuthFailure(
            payload["message"]
                .as_str()
                .unwrap_or("authentication failed")
                .to_string(),
        )),
        "disconnected" => Some(TransportEvent::Disconnected(
            payload["reason"].as_str().unwrap_or("unknown").to_string(),
        )),
        "message" => match serde_json::from_value::<InboundMessage>(payload["message"].clone()) {
            Ok(message) => Some(TransportEvent::Message(message)),
            Err(e) => {
                warn!(error = %e, "malformed message frame from whatsapp bridge");
                None
            }
        },
        "error" => {
            let err = payload["error"].as_str().unwrap_or("unknown");
            error!(error = err, "whatsapp bridge error");
            None
        }
        _ => {
            debug!(frame_type = frame_type, "whatsapp bridge: unknown frame type");
            None
        }
    }
}

fn lock_pending(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<RequestResult>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fail every in-flight request with `Closed`.
fn fail_pending(pending: &PendingMap) {
    let drained: Vec<_> = lock_pending(pending).drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(TransportError::Closed));
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    type ServerWs = WebSocketStream<TcpStream>;

    async fn next_json(ws: &mut ServerWs) -> Value {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(t))) => return serde_json::from_str(t.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    async fn send_json(ws: &mut ServerWs, value: Value) {
        ws.send(WsMessage::text(value.to_string())).await.unwrap();
    }

    /// Spawn a one-connection fake bridge running `script`.
    async fn fake_bridge<F, Fut>(script: F) -> String
    where
        F: FnOnce(ServerWs) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            script(ws).await;
        });
        format!("ws://{addr}")
    }

    fn client_for(url: &str, timeout: Duration) -> (Arc<dyn MessagingClient>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let options = ClientOptions {
            request_timeout: timeout,
            ..Default::default()
        };
        let client = BridgeFactory::new(url).create(&options, tx).unwrap();
        (client, rx)
    }

    #[test]
    fn test_default_bridge_url() {
        assert_eq!(BridgeFactory::new("").bridge_url(), "ws://localhost:3001");
        assert_eq!(
            BridgeFactory::new("ws://mybridge:9000").bridge_url(),
            "ws://mybridge:9000"
        );
    }

    #[test]
    fn test_parse_lifecycle_frames() {
        assert_eq!(
            parse_event(&json!({"type": "qr", "qr": "1@2,ABCxyz=="})),
            Some(TransportEvent::PairingCode("1@2,ABCxyz==".into()))
        );
        assert_eq!(
            parse_event(&json!({"type": "authenticated"})),
            Some(TransportEvent::Authenticated)
        );
        assert_eq!(parse_event(&json!({"type": "ready"})), Some(TransportEvent::Ready));
        assert_eq!(
            parse_event(&json!({"type": "auth_failure", "message": "bad session"})),
            Some(TransportEvent::AuthFailure("bad session".into()))
        );
        assert_eq!(
            parse_event(&json!({"type": "disconnected", "reason": "LOGOUT"})),
            Some(TransportEvent::Disconnected("LOGOUT".into()))
        );
    }

    #[test]
    fn test_parse_message_frame() {
        let frame = json!({
            "type": "message",
            "message": {
                "id": "false_5548999999999@c.us_3EB0",
                "from": "5548999999999@c.us",
                "body": "Bom dia",
                "timestamp": 1700000000,
                "fromMe": false,
                "isGroup": false,
                "type": "chat"
            }
        });
        match parse_event(&frame) {
            Some(TransportEvent::Message(msg)) => {
                assert_eq!(msg.body, "Bom dia");
                assert_eq!(msg.from, "5548999999999@c.us");
                assert_eq!(msg.kind, "chat");
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_ignored_frames() {
        assert_eq!(parse_event(&json!({"type": "qr"})), None);
        assert_eq!(parse_event(&json!({"type": "error", "error": "boom"})), None);
        assert_eq!(parse_event(&json!({"type": "loading_screen", "percent": 40})), None);
        assert_eq!(parse_event(&json!({"type": "message", "message": {}})), None);
    }

    #[test]
    fn test_response_result() {
        let ok = response_result(&json!({"type": "response", "ok": true, "data": {"id": "x"}}));
        assert_eq!(ok.unwrap(), json!({"id": "x"}));

        let busy = response_result(&json!({
            "type": "response", "ok": false, "error": "EBUSY: resource busy or locked", "code": "EBUSY"
        }));
        assert!(matches!(busy, Err(TransportError::ResourceBusy(_))));

        let remote = response_result(&json!({"type": "response", "ok": false, "error": "chat not found"}));
        match remote {
            Err(TransportError::Remote(msg)) => assert_eq!(msg, "chat not found"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_before_initialize() {
        let (client, _rx) = client_for("ws://127.0.0.1:1", Duration::from_secs(1));
        let err = client.get_chats().await.unwrap_err();
        assert!(matches!(err, TransportError::NotStarted));
        // Destroying a client that never started is fine
        client.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_over_websocket() {
        let url = fake_bridge(|mut ws| async move {
            let init = next_json(&mut ws).await;
            assert_eq!(init["type"], "init");
            assert_eq!(init["clientId"], "zapdesk");
            assert_eq!(init["headless"], true);

            send_json(&mut ws, json!({"type": "qr", "qr": "1@2,ABCxyz=="})).await;
            send_json(&mut ws, json!({"type": "ready"})).await;

            let send = next_json(&mut ws).await;
            assert_eq!(send["type"], "send");
            assert_eq!(send["to"], "5548999999999@c.us");
            assert_eq!(send["text"], "Olá");
            send_json(
                &mut ws,
                json!({"type": "response", "requestId": send["requestId"], "ok": true, "data": {"id": "true_5548_3EB0"}}),
            )
            .await;

            let chats = next_json(&mut ws).await;
            assert_eq!(chats["type"], "getChats");
            send_json(
                &mut ws,
                json!({"type": "response", "requestId": chats["requestId"], "ok": true, "data": [
                    {"id": "5548999999999@c.us", "name": "Ana", "isGroup": false, "unreadCount": 2, "lastMessage": "oi"},
                    {"id": "120363@g.us", "name": "Família", "isGroup": true}
                ]}),
            )
            .await;

            let destroy = next_json(&mut ws).await;
            assert_eq!(destroy["type"], "destroy");
            send_json(
                &mut ws,
                json!({"type": "response", "requestId": destroy["requestId"], "ok": false,
                       "error": "EBUSY: resource busy or locked, rmdir", "code": "EBUSY"}),
            )
            .await;
        })
        .await;

        let (client, mut rx) = client_for(&url, Duration::from_secs(5));
        client.initialize().await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::PairingCode("1@2,ABCxyz==".into()))
        );
        assert_eq!(rx.recv().await, Some(TransportEvent::Ready));

        let sent = client.send_message("5548999999999@c.us", "Olá").await.unwrap();
        assert_eq!(sent.id, "true_5548_3EB0");

        let chats = client.get_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].unread_count, 2);
        assert!(chats[1].is_group);

        let err = client.destroy().await.unwrap_err();
        assert!(err.is_benign_teardown());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let url = fake_bridge(|mut ws| async move {
            let _init = next_json(&mut ws).await;
            let _unanswered = next_json(&mut ws).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
        .await;

        let (client, _rx) = client_for(&url, Duration::from_millis(100));
        client.initialize().await.unwrap();

        let err = client.get_chats().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_bridge_close_emits_disconnected() {
        let url = fake_bridge(|mut ws| async move {
            let _init = next_json(&mut ws).await;
            let _ = ws.close(None).await;
        })
        .await;

        let (client, mut rx) = client_for(&url, Duration::from_secs(5));
        client.initialize().await.unwrap();

        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(TransportEvent::Disconnected(_))) => {}
            other => panic!("expected disconnected event, got {other:?}"),
        }
    }
}
