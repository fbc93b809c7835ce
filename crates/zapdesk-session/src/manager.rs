//! Session Manager: owns the lifecycle of the single WhatsApp client.
//!
//! Responsibilities:
//! - Create at most one underlying client at a time (`connect`)
//! - Apply transport events to the session flags, one at a time, in arrival order
//! - Expose status / pairing code reads that reflect the last applied event
//! - Deliver inbound messages to registered handlers, isolating their failures
//! - Tear the client down and always leave the session reconnectable (`disconnect`)
//!
//! ```text
//! Disconnected ──connect()──▶ Initializing ──qr──▶ WaitingPairing ──qr──▶ WaitingPairing
//!      ▲                          │  │                   │
//!      │                          │  └──────ready────────┴──────▶ Connected
//!      └──auth_failure────────────┘                                  │
//!      └──disconnected / disconnect()────────────────────────────────┘
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use zapdesk_core::config::WhatsAppConfig;
use zapdesk_core::types::{ChatSummary, InboundMessage, SentMessage, SessionPhase, SessionStatus};

use crate::addressing::normalize_destination;
use crate::error::{SessionError, TransportError};
use crate::events::SessionEvent;
use crate::transport::{ClientFactory, ClientOptions, MessagingClient, TransportEvent};

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// Capacity of the manager-level event broadcast.
const EVENT_BUFFER: usize = 64;

// ─────────────────────────────────────────────
// Handler registration
// ─────────────────────────────────────────────

/// Callback invoked for every inbound message.
///
/// An `Err` return (or a panic) is logged and does not affect other handlers.
pub type MessageHandlerFn = Arc<dyn Fn(&InboundMessage) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by [`SessionManager::register_message_handler`], used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

// ─────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────

/// Behavioural knobs of the manager that are not transport options.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Prefixed to destinations that lack it.
    pub default_country_code: String,
    /// Cap on chats returned by `list_chats`.
    pub max_chats: usize,
    /// Messages fetched per chat by collaborators using `client()`.
    pub max_messages: usize,
    /// Characters kept in a chat's last-message preview.
    pub preview_chars: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&WhatsAppConfig::default())
    }
}

impl From<&WhatsAppConfig> for SessionSettings {
    fn from(config: &WhatsAppConfig) -> Self {
        Self {
            default_country_code: config.default_country_code.clone(),
            max_chats: config.max_chats,
            max_messages: config.max_messages,
            preview_chars: config.preview_chars,
        }
    }
}

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

#[derive(Default)]
struct SessionState {
    client: Option<Arc<dyn MessagingClient>>,
    pairing_code: Option<String>,
    connected: bool,
    initializing: bool,
    /// An explicit `disconnect()` is waiting on `destroy()`.
    tearing_down: bool,
    /// Bumped whenever a handle is retired; events tagged with an older
    /// generation are dropped.
    generation: u64,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.connected,
            initializing: self.initializing,
        }
    }

    fn phase(&self) -> SessionPhase {
        if self.connected {
            SessionPhase::Connected
        } else if self.initializing && self.pairing_code.is_some() {
            SessionPhase::WaitingPairing
        } else if self.initializing {
            SessionPhase::Initializing
        } else {
            SessionPhase::Disconnected
        }
    }

    /// Reset to `Disconnected`, returning the handle that was live.
    fn retire(&mut self) -> Option<Arc<dyn MessagingClient>> {
        self.generation += 1;
        self.connected = false;
        self.initializing = false;
        self.pairing_code = None;
        self.client.take()
    }
}

struct SessionInner {
    factory: Arc<dyn ClientFactory>,
    options: ClientOptions,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    handlers: Mutex<Vec<(HandlerId, MessageHandlerFn)>>,
    next_handler_id: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

// ─────────────────────────────────────────────
// SessionManager
// ─────────────────────────────────────────────

/// Manages the single outbound WhatsApp client of this process.
///
/// Cheap to clone; clones share the same session. Use
/// [`crate::global::session_or_init`] to get the process-wide instance.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Create a manager. No client is created until [`connect`](Self::connect).
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        options: ClientOptions,
        settings: SessionSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(SessionInner {
                factory,
                options,
                settings,
                state: Mutex::new(SessionState::default()),
                handlers: Mutex::new(Vec::new()),
                next_handler_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Create a manager with options and settings taken from config.
    pub fn from_config(factory: Arc<dyn ClientFactory>, config: &WhatsAppConfig) -> Self {
        Self::new(
            factory,
            ClientOptions::from(config),
            SessionSettings::from(config),
        )
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    // ─────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────

    /// Current `{connected, initializing}` flags.
    pub fn status(&self) -> SessionStatus {
        self.inner.lock_state().status()
    }

    /// The pairing code waiting to be scanned, if any.
    pub fn pairing_code(&self) -> Option<String> {
        self.inner.lock_state().pairing_code.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock_state().phase()
    }

    /// Raw handle to the underlying client, for capabilities beyond this surface.
    pub fn client(&self) -> Option<Arc<dyn MessagingClient>> {
        self.inner.lock_state().client.clone()
    }

    /// Subscribe to manager-level lifecycle and message events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────

    /// Start a connect attempt.
    ///
    /// Returns immediately if a client already exists, a connect attempt is
    /// in flight, or a disconnect is tearing the previous client down. Pairing
    /// and readiness are reported through events; this call only waits for
    /// the client to accept the connect request.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.inner.lock_state();
            if state.client.is_some() || state.initializing || state.tearing_down {
                debug!(phase = %state.phase(), "connect ignored, session already active");
                return Ok(());
            }
            state.generation += 1;
            state.initializing = true;
            state.pairing_code = None;
            state.generation
        };

        info!(
            client_id = %self.inner.options.client_id,
            auth_dir = %self.inner.options.auth_dir.display(),
            "starting whatsapp client"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = match self.inner.factory.create(&self.inner.options, events_tx) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "failed to construct whatsapp client");
                self.inner.retire_if_current(generation);
                return Err(SessionError::TransportConstruction(e));
            }
        };

        let installed = {
            let mut state = self.inner.lock_state();
            if state.generation == generation {
                state.client = Some(client.clone());
                true
            } else {
                false
            }
        };
        if !installed {
            info!("connect attempt aborted by disconnect");
            teardown(client).await;
            return Ok(());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.pump_events(generation, events_rx).await;
        });

        if let Err(e) = client.initialize().await {
            error!(error = %e, "whatsapp client failed to initialize");
            if let Some(client) = self.inner.retire_if_current(generation) {
                teardown(client).await;
            }
            return Err(SessionError::TransportConstruction(e));
        }

        if self.inner.lock_state().generation != generation {
            info!("connect attempt aborted during initialize, releasing late client");
            teardown(client).await;
            return Ok(());
        }

        debug!("whatsapp client initializing");
        Ok(())
    }

    /// Tear the client down.
    ///
    /// Teardown errors are logged, never returned; the session always ends
    /// up `Disconnected` and reconnectable.
    pub async fn disconnect(&self) {
        let client = {
            let mut state = self.inner.lock_state();
            match state.client.take() {
                Some(client) => {
                    state.generation += 1;
                    state.tearing_down = true;
                    Some(client)
                }
                None => {
                    if !state.initializing {
                        debug!("disconnect ignored, no whatsapp client");
                        return;
                    }
                    state.retire();
                    None
                }
            }
        };

        let Some(client) = client else {
            info!("aborted in-flight whatsapp connect attempt");
            self.inner
                .emit(SessionEvent::Disconnected("disconnected by request".to_string()));
            return;
        };

        info!("disconnecting whatsapp client");
        teardown(client).await;

        {
            let mut state = self.inner.lock_state();
            state.retire();
            state.tearing_down = false;
        }

        info!("whatsapp client disconnected");
        self.inner
            .emit(SessionEvent::Disconnected("disconnected by request".to_string()));
    }

    // ─────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────

    /// Send a text message.
    ///
    /// `destination` is a phone number in any common format or a transport
    /// chat id.
    pub async fn send_message(
        &self,
        destination: &str,
        body: &str,
    ) -> Result<SentMessage, SessionError> {
        let client = self.connected_client().ok_or(SessionError::NotConnected)?;
        let chat_id = normalize_destination(destination, &self.inner.settings.default_country_code)?;

        let sent = client.send_message(&chat_id, body).await?;
        info!(chat_id = %chat_id, message_id = %sent.id, "whatsapp message sent");
        Ok(sent)
    }

    /// Individual (non-group) chats, capped at `max_chats`.
    ///
    /// Returns an empty list when not connected.
    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, SessionError> {
        let Some(client) = self.connected_client() else {
            debug!("list_chats while disconnected, returning empty list");
            return Ok(Vec::new());
        };

        let settings = &self.inner.settings;
        let chats = client.get_chats().await?;
        Ok(chats
            .into_iter()
            .filter(|chat| !chat.is_group)
            .take(settings.max_chats)
            .map(|chat| ChatSummary::from_chat(chat, settings.preview_chars))
            .collect())
    }

    fn connected_client(&self) -> Option<Arc<dyn MessagingClient>> {
        let state = self.inner.lock_state();
        if state.connected {
            state.client.clone()
        } else {
            None
        }
    }

    // ─────────────────────────────────────────
    // Handlers
    // ─────────────────────────────────────────

    /// Register a callback for inbound messages. Handlers run in registration order.
    pub fn register_message_handler(&self, handler: MessageHandlerFn) -> HandlerId {
        let id = HandlerId(self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.inner.lock_handlers().push((id, handler));
        debug!(handler = id.0, "registered message handler");
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unregister_message_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.inner.lock_handlers();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(handler = id.0, "unregistered message handler");
        }
        removed
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handlers(&self) -> MutexGuard<'_, Vec<(HandlerId, MessageHandlerFn)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Retire the session if `generation` is still the live one.
    fn retire_if_current(&self, generation: u64) -> Option<Arc<dyn MessagingClient>> {
        let mut state = self.lock_state();
        if state.generation == generation {
            state.retire()
        } else {
            None
        }
    }

    /// Apply the events of one client, in order, until it is retired.
    async fn pump_events(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if !self.apply_event(generation, event).await {
                break;
            }
        }
        debug!(generation, "whatsapp event pump finished");
    }

    /// Apply one transport event. Returns `false` once this generation is retired.
    async fn apply_event(&self, generation: u64, event: TransportEvent) -> bool {
        match event {
            TransportEvent::PairingCode(code) => {
                let accepted = {
                    let mut state = self.lock_state();
                    if state.generation != generation {
                        return false;
                    }
                    if state.initializing {
                        state.pairing_code = Some(code.clone());
                    }
                    state.initializing
                };
                if accepted {
                    info!("whatsapp pairing code received, waiting for scan");
                    self.emit(SessionEvent::PairingCode(code));
                } else {
                    debug!("ignoring pairing code outside of a connect attempt");
                }
            }
            TransportEvent::Authenticated => {
                if self.lock_state().generation != generation {
                    return false;
                }
                info!("whatsapp authenticated");
                self.emit(SessionEvent::Authenticated);
            }
            TransportEvent::Ready => {
                {
                    let mut state = self.lock_state();
                    if state.generation != generation {
                        return false;
                    }
                    state.connected = true;
                    state.initializing = false;
                    state.pairing_code = None;
                }
                info!("whatsapp client ready");
                self.emit(SessionEvent::Ready);
            }
            TransportEvent::AuthFailure(reason) => {
                let Some(client) = self.retire_if_current(generation) else {
                    return false;
                };
                warn!(reason = %reason, "whatsapp authentication failed");
                self.emit(SessionEvent::AuthFailure(reason));
                teardown(client).await;
                return false;
            }
            TransportEvent::Disconnected(reason) => {
                let Some(client) = self.retire_if_current(generation) else {
                    return false;
                };
                warn!(reason = %reason, "whatsapp client disconnected");
                self.emit(SessionEvent::Disconnected(reason));
                teardown(client).await;
                return false;
            }
            TransportEvent::Message(message) => {
                if self.lock_state().generation != generation {
                    return false;
                }
                debug!(
                    from = %message.from,
                    message_id = %message.id,
                    body_len = message.body.len(),
                    "whatsapp inbound message"
                );
                self.dispatch_message(&message);
                self.emit(SessionEvent::Message(message));
            }
        }
        true
    }

    /// Run every handler on `message`, isolating errors and panics.
    fn dispatch_message(&self, message: &InboundMessage) {
        let handlers: Vec<(HandlerId, MessageHandlerFn)> = self.lock_handlers().clone();

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(handler = id.0, error = %e, "message handler failed");
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(handler = id.0, reason = %reason, "message handler panicked");
                }
            }
        }
    }
}

/// Destroy a client, swallowing the benign teardown error and logging the rest.
async fn teardown(client: Arc<dyn MessagingClient>) {
    match client.destroy().await {
        Ok(()) => debug!("whatsapp client destroyed"),
        Err(e) if e.is_benign_teardown() => {
            debug!(error = %e, "ignoring benign whatsapp teardown error");
        }
        Err(TransportError::NotStarted) | Err(TransportError::Closed) => {
            debug!("whatsapp client already closed");
        }
        Err(e) => {
            warn!(error = %e, "whatsapp client teardown failed");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
