//! Error types for the session manager and its transport.

use thiserror::Error;

/// Errors reported by the underlying messaging client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A request was issued before `initialize()` or after `destroy()`.
    #[error("transport not started")]
    NotStarted,

    #[error("transport connection closed")]
    Closed,

    #[error("request `{request}` timed out after {secs}s")]
    Timeout { request: String, secs: u64 },

    /// The browser profile is still locked by the exiting process.
    /// Reported during teardown on some platforms; harmless.
    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("transport error: {0}")]
    Remote(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether this teardown error can be ignored.
    pub fn is_benign_teardown(&self) -> bool {
        matches!(self, TransportError::ResourceBusy(_))
    }
}

/// Errors surfaced by [`crate::SessionManager`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("whatsapp session is not connected")]
    NotConnected,

    #[error("invalid destination: {0:?}")]
    InvalidDestination(String),

    #[error("failed to start whatsapp client: {0}")]
    TransportConstruction(#[source] TransportError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Whether the caller should treat this as a declined request rather than a failure.
    pub fn is_declined(&self) -> bool {
        matches!(
            self,
            SessionError::NotConnected | SessionError::InvalidDestination(_)
        )
    }
}
