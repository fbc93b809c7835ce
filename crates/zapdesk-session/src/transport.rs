//! Transport seam: the abstract interface over the underlying WhatsApp client.
//!
//! The session manager never talks to a concrete client directly. It asks a
//! [`ClientFactory`] for a fresh [`MessagingClient`] on every connect attempt
//! and listens to the [`TransportEvent`]s the client pushes into the
//! [`EventSender`] it was given.
//!
//! - `initialize()`: start the client's own connect sequence
//! - `send_message()` / `get_chats()` / `fetch_messages()`: request/response calls
//! - `destroy()`: tear the client down

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use zapdesk_core::config::WhatsAppConfig;
use zapdesk_core::types::{Chat, ChatMessage, InboundMessage, SentMessage};
use zapdesk_core::utils::expand_home;

use crate::error::TransportError;

/// Lifecycle and message events emitted by a client.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// A new pairing (QR) string is available to scan.
    PairingCode(String),
    /// Credentials were accepted; `Ready` follows once the client has synced.
    Authenticated,
    /// The client is fully usable.
    Ready,
    /// Pairing or restoring stored credentials failed.
    AuthFailure(String),
    /// The transport dropped the session (logout, phone offline, bridge gone).
    Disconnected(String),
    /// An inbound message.
    Message(InboundMessage),
}

/// Sending half given to a client so it can push events to the manager.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Options for constructing a client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Namespace for stored credentials.
    pub client_id: String,
    /// Where pairing credentials persist between restarts.
    pub auth_dir: PathBuf,
    pub headless: bool,
    pub sandbox: bool,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&WhatsAppConfig::default())
    }
}

impl From<&WhatsAppConfig> for ClientOptions {
    fn from(config: &WhatsAppConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            auth_dir: expand_home(&config.auth_dir),
            headless: config.headless,
            sandbox: config.sandbox,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// A live handle to the underlying messaging client.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start the connect sequence.
    ///
    /// Returns once the client has accepted the request. Progress (pairing
    /// code, ready, failures) is reported through events, not through this
    /// call.
    async fn initialize(&self) -> Result<(), TransportError>;

    /// Send a text message to a transport chat id (`<digits>@c.us`).
    async fn send_message(&self, chat_id: &str, body: &str) -> Result<SentMessage, TransportError>;

    /// All chats known to the account, most recent first.
    async fn get_chats(&self) -> Result<Vec<Chat>, TransportError>;

    /// Up to `limit` most recent messages of a chat, oldest first.
    async fn fetch_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError>;

    /// Tear the client down and release its resources.
    async fn destroy(&self) -> Result<(), TransportError>;
}

/// Builds a new client for each connect attempt.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        options: &ClientOptions,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingClient>, TransportError>;
}
